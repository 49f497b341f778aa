//! Room sessions subsystem.
//!
//! # Data Flow
//! ```text
//! GET /yjs/{token} (Upgrade: websocket)
//!     → upgrade.rs (drives machine.rs: path check, existence check, 101)
//!     → registry.rs (session id, active gauge)
//!     → engine.rs (frames handed to the sync engine)
//!     → liveness.rs (lastActivityAt on connect and on every frame)
//! ```
//!
//! # Design Decisions
//! - Admission decisions live in one pure state machine; the handler only executes effects
//! - Liveness writes never block the socket
//! - The gateway never decodes sync frames

pub mod engine;
pub mod liveness;
pub mod machine;
pub mod registry;
pub mod upgrade;

pub use engine::{RelayEngine, SyncEngine, SyncPeer};
pub use liveness::Liveness;
pub use machine::{step, Effect, UpgradeEvent, UpgradeState, ROOM_PATH_PREFIX};
pub use registry::{SessionGuard, SessionId, SessionRegistry};
pub use upgrade::room_upgrade;

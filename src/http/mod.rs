//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net)
//!     → server.rs (router, middleware, accept loop)
//!     → cors gate → projects.rs (project API, health, metrics)
//!                 → session::upgrade (GET /yjs/{token})
//!     → error.rs (JSON error bodies)
//! ```

pub mod error;
pub mod middleware;
pub mod projects;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, GatewayServer};
pub use state::GatewayState;

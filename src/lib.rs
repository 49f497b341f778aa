//! Collaboration gateway library.
//!
//! Accepts WebSocket upgrades for project rooms, authorizes them against
//! project state and hands accepted sockets to a sync engine. Also serves the
//! small HTTP API that creates projects and toggles their lock.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod session;
pub mod store;

// Domain
pub mod clock;
pub mod project;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayServer, GatewayState};
pub use lifecycle::Shutdown;

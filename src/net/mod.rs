//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (hyper HTTP/1.1 + HTTP/2 with upgrades)
//!     → axum router
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - An upgraded socket keeps its connection slot until the session ends
//! - A handler can drop its connection without writing a response
//! - TLS is terminated in front of the gateway

pub mod connection;
pub mod listener;

pub use connection::{serve_connection, AbortConnection};
pub use listener::{ConnectionPermit, Listener, ListenerError};

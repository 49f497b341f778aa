//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (HTTP or upgrade):
//!     → cors.rs (Origin allow-list, preflight)
//!     → handler
//!
//! Project creation:
//!     → tokens.rs (public token + secret owner key)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an Origin that cannot be parsed is rejected
//! - Owner keys are capabilities; they are returned once and compared exactly

pub mod cors;
pub mod tokens;

pub use cors::{cors_gate, OriginAllowList};
pub use tokens::{generate_owner_key, generate_token};

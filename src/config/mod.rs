//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → origin allow-list swapped atomically
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty environment yields a working dev setup
//! - Environment wins over the file
//! - Permissive room admission is never inferred; it must be set explicitly

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{apply_env, load_config, load_startup_config, ConfigError};
pub use schema::{
    CorsConfig, ExistenceCheck, GatewayConfig, ListenerConfig, RoomConfig, StoreConfig,
};

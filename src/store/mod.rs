//! Project store subsystem.
//!
//! # Data Flow
//! ```text
//! Project API / upgrade handler
//!     → TimedStore (deadline on every call)
//!     → RedisStore (production) or MemoryStore (dev, tests)
//!     → record.rs (hash fields ⇄ ProjectMeta)
//! ```
//!
//! # Design Decisions
//! - The store owns durable records; callers only hold tokens
//! - `merge_fields` is an upsert of the given fields only
//! - `lastActivityAt` is merged with max semantics at the store boundary
//! - `exists` consults the existence index, not the record itself
//! - No retries: callers decide whether a failure matters

pub mod memory;
pub mod record;
pub mod redis;
pub mod timeout;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::project::{OwnerKey, ProjectMeta, ProjectPatch, RoomToken, Timestamp};

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;
pub use self::timeout::TimedStore;

/// Errors raised by a project store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or command failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// A stored record could not be decoded.
    #[error("corrupt record for project {token}: {reason}")]
    Corrupt { token: String, reason: String },
}

/// Operations the gateway needs from the durable project store.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a new unlocked record and add the token to the existence index.
    async fn create(
        &self,
        token: &RoomToken,
        owner_key: &OwnerKey,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Fetch a record; `Ok(None)` when the project does not exist.
    async fn get(&self, token: &RoomToken) -> Result<Option<ProjectMeta>, StoreError>;

    /// Upsert the fields set in `patch`, leaving all others untouched.
    ///
    /// `lastActivityAt` only moves forward: a value older than the stored one
    /// is ignored, so concurrent touches may land in any order.
    async fn merge_fields(&self, token: &RoomToken, patch: &ProjectPatch) -> Result<(), StoreError>;

    /// Membership check against the existence index.
    async fn exists(&self, token: &RoomToken) -> Result<bool, StoreError>;
}

/// Build the store selected by `config.url`, wrapped in a call deadline.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ProjectStore>, StoreError> {
    let deadline = Duration::from_millis(config.timeout_ms);
    let scheme = config
        .url
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .unwrap_or_default();

    match scheme {
        "memory" => {
            tracing::warn!("Using in-memory project store; projects are lost on restart");
            Ok(Arc::new(TimedStore::new(MemoryStore::new(), deadline)))
        }
        "redis" | "rediss" => {
            let store = RedisStore::open(&config.url, &config.key_prefix)?;
            Ok(Arc::new(TimedStore::new(store, deadline)))
        }
        other => Err(StoreError::Unavailable(format!(
            "unsupported store scheme '{}'",
            other
        ))),
    }
}

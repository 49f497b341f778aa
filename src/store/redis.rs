//! Redis-backed project store.
//!
//! # Layout
//! ```text
//! {prefix}:project:{token}   hash  ownerKey / locked / lastActivityAt
//! {prefix}:projects          hash  token → "1"   (existence index)
//! ```
//!
//! `merge_fields` runs as a Lua script so that `lastActivityAt` is compared and
//! written in one step and never moves backwards.
//!
//! The connection is opened lazily on first use and re-established by the
//! connection manager, so the gateway can start while Redis is down.

use std::collections::HashMap;

use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::project::{OwnerKey, ProjectMeta, ProjectPatch, RoomToken, Timestamp};
use crate::store::record::{initial_fields, parse_fields, patch_fields, FIELD_LAST_ACTIVITY};
use crate::store::{ProjectStore, StoreError};

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// `KEYS[1]` is the project hash, `ARGV[1]` the activity field name, then
/// field/value pairs. The activity field is only written when it does not
/// move backwards.
const MERGE_SCRIPT: &str = r#"
local activity = ARGV[1]
for i = 2, #ARGV, 2 do
  local field, value = ARGV[i], ARGV[i + 1]
  if field == activity then
    local current = tonumber(redis.call('HGET', KEYS[1], field))
    if current == nil or current <= tonumber(value) then
      redis.call('HSET', KEYS[1], field, value)
    end
  else
    redis.call('HSET', KEYS[1], field, value)
  end
end
return 1
"#;

pub struct RedisStore {
    client: ::redis::Client,
    connection: OnceCell<ConnectionManager>,
    merge: ::redis::Script,
    prefix: String,
}

impl RedisStore {
    /// Validate the URL and prepare a client. Does not connect.
    pub fn open(url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            merge: ::redis::Script::new(MERGE_SCRIPT),
            prefix: prefix.to_string(),
        })
    }

    fn project_key(&self, token: &RoomToken) -> String {
        format!("{}:project:{}", self.prefix, token)
    }

    fn index_key(&self) -> String {
        format!("{}:projects", self.prefix)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                tracing::info!("Connected to project store");
                Ok::<_, StoreError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl ProjectStore for RedisStore {
    async fn create(
        &self,
        token: &RoomToken,
        owner_key: &OwnerKey,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = ::redis::pipe()
            .atomic()
            .hset_multiple(self.project_key(token), &initial_fields(owner_key, now))
            .ignore()
            .hset(self.index_key(), token.as_str(), "1")
            .ignore()
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn get(&self, token: &RoomToken) -> Result<Option<ProjectMeta>, StoreError> {
        let mut con = self.connection().await?;
        let fields: HashMap<String, String> = con.hgetall(self.project_key(token)).await?;
        parse_fields(token, &fields)
    }

    async fn merge_fields(&self, token: &RoomToken, patch: &ProjectPatch) -> Result<(), StoreError> {
        let fields = patch_fields(patch);
        if fields.is_empty() {
            return Ok(());
        }
        let mut con = self.connection().await?;
        let mut invocation = self.merge.key(self.project_key(token));
        invocation.arg(FIELD_LAST_ACTIVITY);
        for (name, value) in &fields {
            invocation.arg(*name).arg(value);
        }
        let _: i64 = invocation.invoke_async(&mut con).await?;
        Ok(())
    }

    async fn exists(&self, token: &RoomToken) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let present: bool = con.hexists(self.index_key(), token.as_str()).await?;
        Ok(present)
    }
}

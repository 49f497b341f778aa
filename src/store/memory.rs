//! In-process project store.
//!
//! Mirrors the Redis layout (one field map per project plus an existence
//! index) so both stores share the same decoding rules.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::project::{OwnerKey, ProjectMeta, ProjectPatch, RoomToken, Timestamp};
use crate::store::record::{
    advances_activity, initial_fields, parse_fields, patch_fields, FIELD_LAST_ACTIVITY,
};
use crate::store::{ProjectStore, StoreError};

/// A thread-safe, non-durable project store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<RoomToken, HashMap<String, String>>>,
    index: Arc<DashSet<RoomToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self, token: &RoomToken, fields: Vec<(&'static str, String)>) {
        let mut record = self.records.entry(token.clone()).or_default();
        for (name, value) in fields {
            if name == FIELD_LAST_ACTIVITY
                && !advances_activity(record.get(name).map(String::as_str), &value)
            {
                continue;
            }
            record.insert(name.to_string(), value);
        }
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create(
        &self,
        token: &RoomToken,
        owner_key: &OwnerKey,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        self.write(token, initial_fields(owner_key, now));
        self.index.insert(token.clone());
        Ok(())
    }

    async fn get(&self, token: &RoomToken) -> Result<Option<ProjectMeta>, StoreError> {
        match self.records.get(token) {
            Some(record) => parse_fields(token, record.value()),
            None => Ok(None),
        }
    }

    async fn merge_fields(&self, token: &RoomToken, patch: &ProjectPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.write(token, patch_fields(patch));
        Ok(())
    }

    async fn exists(&self, token: &RoomToken) -> Result<bool, StoreError> {
        Ok(self.index.contains(token))
    }
}

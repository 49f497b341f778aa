//! Deadline enforcement for store calls.
//!
//! A slow or unreachable store must not stall upgrade processing, so every
//! call is bounded. An elapsed deadline surfaces as [`StoreError::Timeout`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::project::{OwnerKey, ProjectMeta, ProjectPatch, RoomToken, Timestamp};
use crate::store::{ProjectStore, StoreError};

/// Wraps a store so that each call fails after `deadline`.
pub struct TimedStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.deadline)),
        }
    }
}

#[async_trait]
impl<S: ProjectStore> ProjectStore for TimedStore<S> {
    async fn create(
        &self,
        token: &RoomToken,
        owner_key: &OwnerKey,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        self.bounded(self.inner.create(token, owner_key, now)).await
    }

    async fn get(&self, token: &RoomToken) -> Result<Option<ProjectMeta>, StoreError> {
        self.bounded(self.inner.get(token)).await
    }

    async fn merge_fields(&self, token: &RoomToken, patch: &ProjectPatch) -> Result<(), StoreError> {
        self.bounded(self.inner.merge_fields(token, patch)).await
    }

    async fn exists(&self, token: &RoomToken) -> Result<bool, StoreError> {
        self.bounded(self.inner.exists(token)).await
    }
}

//! Project domain types.
//!
//! A project is identified by a public [`RoomToken`] and guarded by a secret
//! [`OwnerKey`]. [`ProjectMeta`] is the typed view of a stored record and
//! [`ProjectPatch`] a partial update of it.

use serde::{Deserialize, Serialize};

/// Longest token accepted from a path.
pub const MAX_TOKEN_LEN: usize = 128;

/// Public project identifier, also used as the sync room name.
///
/// Restricted to URL-safe identifier characters (`A-Z a-z 0-9 _ -`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomToken(String);

/// A token string that is empty, too long or contains forbidden characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed room token")]
pub struct InvalidToken;

impl RoomToken {
    pub fn parse(raw: &str) -> Result<Self, InvalidToken> {
        if raw.is_empty() || raw.len() > MAX_TOKEN_LEN {
            return Err(InvalidToken);
        }
        if !raw.bytes().all(is_token_byte) {
            return Err(InvalidToken);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

impl std::fmt::Display for RoomToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret capability that authorizes lock state changes.
#[derive(Clone, PartialEq, Eq)]
pub struct OwnerKey(String);

impl OwnerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compare against a presented key without short-circuiting on the first
    /// differing byte.
    pub fn matches(&self, presented: &str) -> bool {
        let a = self.0.as_bytes();
        let b = presented.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl std::fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OwnerKey(<redacted>)")
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed project metadata as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMeta {
    pub token: RoomToken,
    /// `None` for records that only ever received liveness touches.
    pub owner_key: Option<OwnerKey>,
    pub locked: bool,
    pub last_activity_at: Timestamp,
}

impl ProjectMeta {
    /// Whether `presented` proves ownership. Records without a key have no owner.
    pub fn is_owned_by(&self, presented: Option<&str>) -> bool {
        match (&self.owner_key, presented) {
            (Some(key), Some(presented)) => key.matches(presented),
            _ => false,
        }
    }
}

/// Partial update merged into a stored record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub locked: Option<bool>,
    pub last_activity_at: Option<Timestamp>,
}

impl ProjectPatch {
    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            ..Self::default()
        }
    }

    pub fn touched(at: Timestamp) -> Self {
        Self {
            last_activity_at: Some(at),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locked.is_none() && self.last_activity_at.is_none()
    }
}

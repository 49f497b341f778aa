//! Parse/serialize boundary between hash fields and [`ProjectMeta`].
//!
//! Stored records are flat string maps:
//!
//! | Field            | Encoding                         |
//! |------------------|----------------------------------|
//! | `ownerKey`       | opaque string                    |
//! | `locked`         | `"0"` or `"1"`                   |
//! | `lastActivityAt` | milliseconds since epoch, decimal |

use std::collections::HashMap;

use crate::project::{OwnerKey, ProjectMeta, ProjectPatch, RoomToken, Timestamp};
use crate::store::StoreError;

pub const FIELD_OWNER_KEY: &str = "ownerKey";
pub const FIELD_LOCKED: &str = "locked";
pub const FIELD_LAST_ACTIVITY: &str = "lastActivityAt";

/// Fields written by `create`.
pub fn initial_fields(owner_key: &OwnerKey, now: Timestamp) -> Vec<(&'static str, String)> {
    vec![
        (FIELD_OWNER_KEY, owner_key.expose().to_string()),
        (FIELD_LOCKED, encode_bool(false)),
        (FIELD_LAST_ACTIVITY, now.as_millis().to_string()),
    ]
}

/// Fields written by `merge_fields`; only the ones the patch sets.
pub fn patch_fields(patch: &ProjectPatch) -> Vec<(&'static str, String)> {
    let mut fields = Vec::with_capacity(2);
    if let Some(locked) = patch.locked {
        fields.push((FIELD_LOCKED, encode_bool(locked)));
    }
    if let Some(at) = patch.last_activity_at {
        fields.push((FIELD_LAST_ACTIVITY, at.as_millis().to_string()));
    }
    fields
}

/// Whether writing `candidate` as `lastActivityAt` keeps the field from moving
/// backwards. A missing or unreadable current value is always replaced.
pub fn advances_activity(current: Option<&str>, candidate: &str) -> bool {
    match (current.and_then(|c| c.parse::<u64>().ok()), candidate.parse::<u64>()) {
        (Some(current), Ok(candidate)) => candidate >= current,
        _ => true,
    }
}

/// Decode a stored hash. An empty hash means the project does not exist.
pub fn parse_fields(
    token: &RoomToken,
    fields: &HashMap<String, String>,
) -> Result<Option<ProjectMeta>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let corrupt = |reason: String| StoreError::Corrupt {
        token: token.to_string(),
        reason,
    };

    let locked = match fields.get(FIELD_LOCKED).map(String::as_str) {
        None | Some("0") => false,
        Some("1") => true,
        Some(other) => return Err(corrupt(format!("locked = '{}'", other))),
    };

    let last_activity_at = match fields.get(FIELD_LAST_ACTIVITY) {
        None => Timestamp::ZERO,
        Some(raw) => raw
            .parse::<u64>()
            .map(Timestamp)
            .map_err(|_| corrupt(format!("lastActivityAt = '{}'", raw)))?,
    };

    let owner_key = fields
        .get(FIELD_OWNER_KEY)
        .filter(|k| !k.is_empty())
        .map(|k| OwnerKey::new(k.clone()));

    Ok(Some(ProjectMeta {
        token: token.clone(),
        owner_key,
        locked,
        last_activity_at,
    }))
}

fn encode_bool(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

//! Project credential generation.
//!
//! Tokens carry 64 bits of entropy and owner keys 192 bits, both encoded as
//! unpadded URL-safe base64 so they can sit in a path segment unescaped.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::project::{OwnerKey, RoomToken};

const TOKEN_BYTES: usize = 8;
const OWNER_KEY_BYTES: usize = 24;

fn random_segment(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A fresh public project token.
pub fn generate_token() -> RoomToken {
    // Base64url output only contains token characters.
    RoomToken::parse(&random_segment(TOKEN_BYTES)).unwrap_or_else(|_| unreachable!())
}

/// A fresh secret owner key.
pub fn generate_owner_key() -> OwnerKey {
    OwnerKey::new(random_segment(OWNER_KEY_BYTES))
}

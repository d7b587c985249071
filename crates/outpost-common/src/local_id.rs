//! Content-addressed local IDs for the text interface.
//!
//! The text interface never leaks `ActivityPub` URLs directly; instead it
//! hands out the hex SHA-256 of the actor or object id and keeps a mapping
//! table (see `outpost_db::repositories`) back to the real URL.

use sha2::{Digest, Sha256};

/// Hash an `ActivityPub` id (actor or object URL) into the local hex id
/// used on the text interface.
#[must_use]
pub fn hash_local_id(ap_id: &str) -> String {
    let digest = Sha256::digest(ap_id.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_and_hex() {
        let a = hash_local_id("https://example.com/users/alice");
        let b = hash_local_id("https://example.com/users/alice");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn differs_per_input() {
        let a = hash_local_id("https://example.com/notes/1");
        let b = hash_local_id("https://example.com/notes/2");
        assert_ne!(a, b);
    }
}

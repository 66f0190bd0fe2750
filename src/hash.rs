//! Content hashing for canonical definition text.
//!
//! The generated artifact embeds the same digest, computed by the
//! external relay compiler over the identical canonical text. Both sides
//! must agree across processes and platforms, which is why the digest is
//! taken over UTF-8 bytes of the printer output and never over the
//! surface text of the literal.

use md5::{Digest, Md5};

/// Binding-name prefix shared by every generated identifier.
pub const IDENTIFIER_PREFIX: &str = "graphql__";

/// 128-bit content hash of canonical text, rendered as 32 lowercase hex
/// characters.
pub fn content_hash(canonical_text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(canonical_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic binding identifier for a content hash. Doubles as the
/// per-file dedup key: two literals with identical canonical text share
/// one binding no matter how their surface text differed.
pub fn identifier(hash: &str) -> String {
    format!("{}{}", IDENTIFIER_PREFIX, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_hash_convention() {
        // Digest of the canonical print of `query Test { __typename }`,
        // as embedded by the external generator.
        assert_eq!(
            content_hash("query Test {\n  __typename\n}"),
            "f4ce3be5b8e81a99157cd3e378f936b6"
        );
    }

    #[test]
    fn test_identifier_prefix() {
        assert_eq!(
            identifier("f4ce3be5b8e81a99157cd3e378f936b6"),
            "graphql__f4ce3be5b8e81a99157cd3e378f936b6"
        );
    }

    #[test]
    fn test_hash_is_pure() {
        assert_eq!(content_hash("fragment F on T {\n  a\n}"), content_hash("fragment F on T {\n  a\n}"));
        assert_ne!(content_hash("a"), content_hash("b"));
    }
}

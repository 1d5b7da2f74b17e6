//! Identifier helpers shared by the content model and the store.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

/// Fresh opaque identifier for songs, sections, lines, and chords.
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// URL-safe share token derived from 16 random bytes.
pub fn share_token() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate(), generate());
    }

    #[test]
    fn share_tokens_are_url_safe() {
        let token = share_token();
        assert_eq!(token.len(), 22);
        assert!(token
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }
}

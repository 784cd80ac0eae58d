//! One-way identifiers derived from credentials.
//!
//! The relay never sees a raw access token. It is addressed with SHA-256
//! digests encoded as URL-safe base64 without padding, which are stable for
//! a given input and cannot be reversed to the credential.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use sha2::{Digest, Sha256};

/// Digest arbitrary bytes into a URL-safe, padding-free base64 string.
pub fn digest(input: &[u8]) -> String {
    BASE64URL.encode(Sha256::digest(input))
}

/// Digest of the access token alone.
///
/// The relay uses this to decide which installation owns write priority for
/// the token.
pub fn token_digest(access_token: &str) -> String {
    digest(access_token.as_bytes())
}

/// Client identifier: digest of the access token followed by the install id.
///
/// Used both in the push endpoint path and as the server-key cache key.
pub fn client_identifier(access_token: &str, install_id: &str) -> String {
    let mut input = Vec::with_capacity(access_token.len() + install_id.len());
    input.extend_from_slice(access_token.as_bytes());
    input.extend_from_slice(install_id.as_bytes());
    digest(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_vector() {
        // SHA-256("abc"), base64url without padding
        assert_eq!(
            digest(b"abc"),
            "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0"
        );
    }

    #[test]
    fn test_digest_is_url_safe_and_unpadded() {
        for input in ["", "a", "token?with/odd+chars", "日本語"] {
            let out = digest(input.as_bytes());
            assert_eq!(out.len(), 43);
            assert!(!out.contains('='));
            assert!(!out.contains('+'));
            assert!(!out.contains('/'));
        }
    }

    #[test]
    fn test_client_identifier_is_stable() {
        let a = client_identifier("token", "install");
        let b = client_identifier("token", "install");
        assert_eq!(a, b);
        assert_eq!(a, digest(b"tokeninstall"));
    }

    #[test]
    fn test_client_identifier_changes_with_inputs() {
        let base = client_identifier("token", "install");
        assert_ne!(base, client_identifier("token2", "install"));
        assert_ne!(base, client_identifier("token", "install2"));
        assert_ne!(base, token_digest("token"));
    }
}

/// Invitation token utilities
///
/// Generates and validates the single-use tokens that invitation links
/// carry. The plaintext token is shown once at creation; only its SHA-256
/// hash is stored, so a database leak doesn't expose usable invitation
/// links.
///
/// # Token Format
///
/// Tokens follow the pattern `fctinv_{32_chars}` (39 chars total):
/// - Prefix: "fctinv_" (7 chars)
/// - Random part: 32 alphanumeric chars (base62: [A-Za-z0-9])
///
/// # Example
///
/// ```
/// use facture_shared::auth::token::{generate_invitation_token, hash_invitation_token, validate_token_format};
///
/// let (plaintext, hash) = generate_invitation_token();
/// assert!(plaintext.starts_with("fctinv_"));
/// assert_eq!(plaintext.len(), 39);
///
/// assert!(validate_token_format(&plaintext));
/// assert_eq!(hash, hash_invitation_token(&plaintext));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the random part of the token (characters)
const TOKEN_RANDOM_LENGTH: usize = 32;

/// Invitation token prefix
const TOKEN_PREFIX: &str = "fctinv_";

/// Total length of an invitation token (prefix + random)
pub const INVITATION_TOKEN_LENGTH: usize = TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH;

/// Generates a new invitation token
///
/// # Returns
///
/// Tuple of (plaintext_token, sha256_hash). The hash goes in the database;
/// the plaintext goes in the invitation link and is never stored.
///
/// # Security
///
/// - Uses `rand::thread_rng()` for cryptographic randomness
/// - Token space: 62^32 (about 2^190 combinations)
pub fn generate_invitation_token() -> (String, String) {
    let random_part = generate_random_string(TOKEN_RANDOM_LENGTH);
    let token = format!("{}{}", TOKEN_PREFIX, random_part);
    let hash = hash_invitation_token(&token);

    (token, hash)
}

/// Generates a random alphanumeric string
///
/// Uses base62 encoding (A-Z, a-z, 0-9) for URL-safe tokens.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Hashes an invitation token using SHA-256
///
/// # Returns
///
/// Hex-encoded SHA-256 hash (64 characters). Deterministic, so the stored
/// hash can be looked up directly by hashing a presented token.
pub fn hash_invitation_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validates invitation token format
///
/// Checks that the token starts with `fctinv_`, has the correct length, and
/// contains only alphanumeric characters after the prefix. Lets handlers
/// reject garbage before touching the database.
pub fn validate_token_format(token: &str) -> bool {
    if token.len() != INVITATION_TOKEN_LENGTH {
        return false;
    }

    if !token.starts_with(TOKEN_PREFIX) {
        return false;
    }

    let random_part = &token[TOKEN_PREFIX.len()..];
    random_part.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_invitation_token() {
        let (token1, hash1) = generate_invitation_token();
        let (token2, hash2) = generate_invitation_token();

        assert!(token1.starts_with("fctinv_"));
        assert_eq!(token1.len(), INVITATION_TOKEN_LENGTH);

        assert_ne!(token1, token2);
        assert_ne!(hash1, hash2);

        assert_eq!(hash1.len(), 64);
        assert_eq!(hash2.len(), 64);
    }

    #[test]
    fn test_hash_invitation_token() {
        let hash = hash_invitation_token("fctinv_test123");

        assert_eq!(hash.len(), 64);

        // Deterministic
        assert_eq!(hash, hash_invitation_token("fctinv_test123"));

        // Different token = different hash
        assert_ne!(hash, hash_invitation_token("fctinv_different"));
    }

    #[test]
    fn test_validate_token_format() {
        // Valid
        assert!(validate_token_format(
            "fctinv_abcdefghijklmnopqrstuvwxyz123456"
        ));
        assert!(validate_token_format(
            "fctinv_ABCDEFGHIJKLMNOPQRSTUVWXYZ123456"
        ));

        // Wrong prefix
        assert!(!validate_token_format(
            "wrongp_abcdefghijklmnopqrstuvwxyz123456"
        ));

        // Too short
        assert!(!validate_token_format("fctinv_short"));

        // Too long
        assert!(!validate_token_format(
            "fctinv_abcdefghijklmnopqrstuvwxyz1234567890"
        ));

        // Special characters in the random part
        assert!(!validate_token_format(
            "fctinv_abc!@#$%^&*()_+={}[]|abcdefghi"
        ));

        // No prefix at all
        assert!(!validate_token_format(
            "abcdefghijklmnopqrstuvwxyz1234567890123"
        ));
    }

    #[test]
    fn test_full_token_workflow() {
        let (plaintext, hash) = generate_invitation_token();

        assert!(validate_token_format(&plaintext));
        assert_eq!(hash_invitation_token(&plaintext), hash);

        let (other, _) = generate_invitation_token();
        assert_ne!(hash_invitation_token(&other), hash);
    }
}

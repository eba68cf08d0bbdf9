//! OAuth state values for CSRF protection
//!
//! The login page stores a fresh state in the session and passes it to the
//! provider; the callback must echo it back unchanged.

/// Generate a cryptographically secure random state value
pub fn generate_state() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    base64_url_encode(&bytes)
}

/// Compare the state returned by the provider with the one issued
///
/// Constant-time over the returned value so the comparison leaks nothing
/// about the issued state.
pub fn state_matches(issued: Option<&str>, returned: Option<&str>) -> bool {
    let (Some(issued), Some(returned)) = (issued, returned) else {
        return false;
    };
    if issued.is_empty() || issued.len() != returned.len() {
        return false;
    }
    issued
        .bytes()
        .zip(returned.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Base64 URL-safe encoding without padding
fn base64_url_encode(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state_uniqueness() {
        let state1 = generate_state();
        let state2 = generate_state();
        assert_ne!(state1, state2);
        // Base64 URL-safe encoding of 32 bytes = 43 chars (without padding)
        assert_eq!(state1.len(), 43);
    }

    #[test]
    fn test_state_matches() {
        let state = generate_state();
        assert!(state_matches(Some(&state), Some(&state)));
        assert!(!state_matches(Some(&state), Some("forged")));
        assert!(!state_matches(Some(&state), None));
        assert!(!state_matches(None, Some(&state)));
        assert!(!state_matches(Some(""), Some("")));
    }
}

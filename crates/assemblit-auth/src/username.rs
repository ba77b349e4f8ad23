// crates/assemblit-auth/src/username.rs
// ============================================================================
// Module: Usernames
// Description: Username normalization and email-shape checks.
// Purpose: Keep one canonical spelling per account.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Usernames are email addresses. They are trimmed and lower-cased before
//! any lookup, so `Ada@Example.com ` and `ada@example.com` are one account.
//! Only the shape is checked; deliverability is not.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum username length in bytes.
const MAX_USERNAME_LENGTH: usize = 254;

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Returns the canonical form of `username`, or `None` when it is not shaped
/// like `local@domain.tld`.
#[must_use]
pub fn normalize_username(username: &str) -> Option<String> {
    let normalized = username.trim().to_lowercase();
    if normalized.len() > MAX_USERNAME_LENGTH || normalized.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return None;
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_lowercases() {
        assert_eq!(normalize_username("  Ada@Example.COM "), Some("ada@example.com".to_string()));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in [
            "ada",
            "@example.com",
            "ada@example",
            "ada@@example.com",
            "a da@example.com",
            "ada@example..com",
        ] {
            assert_eq!(normalize_username(input), None, "{input}");
        }
    }
}

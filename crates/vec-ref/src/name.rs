//! Branch name validation.

use crate::RefError;

/// Validate a branch name.
///
/// Rejected: empty names, leading/trailing `/` or `.`, consecutive slashes,
/// `..` anywhere, control bytes, space, the characters `: ? [ \ ^ ~ *`,
/// the sequence `@{`, and a trailing `.lock`.
pub fn validate_branch_name(name: &str) -> Result<(), RefError> {
    let reject = |reason: &str| {
        Err(RefError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("empty name");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return reject("leading or trailing slash");
    }
    if name.starts_with('.') || name.ends_with('.') {
        return reject("leading or trailing dot");
    }
    if name.contains("//") {
        return reject("consecutive slashes");
    }
    if name.contains("..") {
        return reject("contains '..'");
    }
    if name.contains("@{") {
        return reject("contains '@{'");
    }
    if name.ends_with(".lock") {
        return reject("ends with '.lock'");
    }
    for c in name.chars() {
        if c.is_control() || " :?[\\^~*".contains(c) {
            return reject("forbidden character");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_names() {
        for name in ["main", "feature", "feature/login", "v1.2-rc", "user_x"] {
            assert!(validate_branch_name(name).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in [
            "",
            "/lead",
            "trail/",
            ".hidden",
            "dot.",
            "a//b",
            "a..b",
            "has space",
            "has:colon",
            "star*",
            "tilde~",
            "caret^",
            "quest?",
            "back\\slash",
            "br[acket",
            "ref@{1}",
            "name.lock",
        ] {
            assert!(validate_branch_name(name).is_err(), "accepted {name}");
        }
    }
}

//! Request validation on the mutation path.

use crate::error::ApiError;
use regex::Regex;
use std::sync::OnceLock;

/// Characters the repository reserves for its own addressing syntax.
const NAME_PATTERN: &str = r"^[^\s/\[\]|*][^/\[\]|*]*$";

fn name_regex() -> &'static Regex {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("static pattern"))
}

/// Check a property/child/mixin name before it reaches the repository:
/// non-empty, no path separators, brackets, pipes, or wildcards, and no
/// leading whitespace.
pub fn validate_item_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::validation("item name must not be empty"));
    }
    if !name_regex().is_match(name) {
        return Err(ApiError::validation(format!(
            "invalid item name '{name}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_namespaced_names() {
        for name in ["title", "doc:title", "a-b_c.d", "x1"] {
            assert!(validate_item_name(name).is_ok(), "rejected '{name}'");
        }
    }

    #[test]
    fn rejects_reserved_syntax() {
        for name in ["", "a/b", "a[1]", "a|b", "a*", " lead"] {
            assert!(validate_item_name(name).is_err(), "accepted '{name}'");
        }
    }
}

use std::sync::LazyLock;

use regex::Regex;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());
static BRANCH_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").unwrap());

/// Make a user-supplied name safe to use as a single path component.
///
/// Everything outside `[A-Za-z0-9._-]` is dropped (which removes `/` and
/// `\`), then `..` is removed until none remains. Removing `..` can create a
/// new `..` from surrounding dots, hence the loop; the result is a fixed
/// point, so sanitizing twice is the same as sanitizing once.
pub fn sanitize_filename(name: &str) -> String {
    let mut name = DISALLOWED.replace_all(name, "").into_owned();
    while name.contains("..") {
        name = name.replace("..", "");
    }
    name
}

/// Check a branch name against the subset of git ref rules we accept.
pub fn validate_branch_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Branch name cannot be empty".to_string());
    }
    if !BRANCH_NAME.is_match(name) {
        return Err(format!(
            "Branch name `{}` may only contain letters, digits, `.`, `_`, `-` and `/`",
            name
        ));
    }
    if name.contains("..") || name.contains("//") {
        return Err(format!("Branch name `{}` contains an empty path segment", name));
    }
    if name.starts_with('-') || name.starts_with('/') || name.ends_with('/') {
        return Err(format!("Branch name `{}` has an invalid first or last character", name));
    }
    if name.ends_with(".lock") || name.ends_with('.') {
        return Err(format!("Branch name `{}` has an invalid suffix", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename("notes/../secret.txt"), "notessecret.txt");
    }

    #[test]
    fn test_strips_disallowed_characters() {
        assert_eq!(sanitize_filename("my file (1).md"), "myfile1.md");
        assert_eq!(sanitize_filename("héllo_wörld-2.rs"), "hllo_wrld-2.rs");
        assert_eq!(sanitize_filename("$(rm -rf)"), "rm-rf");
        assert_eq!(sanitize_filename("README.md"), "README.md");
    }

    #[test]
    fn test_is_idempotent() {
        let inputs = [
            "../../etc/passwd",
            "a.b./.c",
            "....",
            ".../x",
            "a/..b",
            "x. .y",
            "normal-name_1.txt",
            "",
            "🙂.txt",
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            let twice = sanitize_filename(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
            assert!(!once.contains(".."), "{:?} left a traversal", input);
        }
    }

    #[test]
    fn test_validate_branch_name() {
        assert!(validate_branch_name("feature-x").is_ok());
        assert!(validate_branch_name("jnb/fix.1").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("a..b").is_err());
        assert!(validate_branch_name("-flag").is_err());
        assert!(validate_branch_name("trailing/").is_err());
        assert!(validate_branch_name("x.lock").is_err());
    }
}

//! Utility functions for string handling and file system preparation.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging long payloads
//! - Label capitalization and list joining for annotation fields
//! - Output path validation before the first flush

use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

use crate::models::NONE_VALUE;

/// Truncate a string for logging purposes.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits, otherwise at most `max` bytes (backing
/// off to the nearest character boundary) with `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Capitalize the first character of a string.
///
/// Used to normalize service sentiment labels (`positive` -> `Positive`).
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Comma-join the given labels, or `"None"` when there are none.
///
/// # Arguments
///
/// * `items` - Labels in service order; blank entries are dropped
///
/// # Examples
///
/// ```ignore
/// assert_eq!(join_or_none(["Ohio", " Reuters "]), "Ohio, Reuters");
/// assert_eq!(join_or_none(Vec::<String>::new()), "None");
/// ```
pub fn join_or_none<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .join(", ");
    if joined.is_empty() {
        NONE_VALUE.to_string()
    } else {
        joined
    }
}

/// Ensure the directory that will hold `path` exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).await?;
            debug!(dir = %parent.display(), "Output directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        // 'é' is two bytes; cutting at 3 would split the second one.
        let result = truncate_for_log("éééé", 3);
        assert!(result.starts_with("é…"));
        assert!(result.contains("(+6 bytes)"));
    }

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("positive"), "Positive");
        assert_eq!(upcase("Neutral"), "Neutral");
        assert_eq!(upcase(""), "");
    }

    #[test]
    fn test_join_or_none() {
        assert_eq!(join_or_none(["/news", "/politics"]), "/news, /politics");
        assert_eq!(join_or_none(Vec::<String>::new()), "None");
        assert_eq!(join_or_none(["  ", ""]), "None");
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/out.csv");
        ensure_parent_dir(&target).await.unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_bare_filename() {
        ensure_parent_dir(Path::new("out.csv")).await.unwrap();
    }
}

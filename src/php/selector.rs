//! PHP version selection.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// Versions the engine can be started with, oldest first.
pub const SUPPORTED_VERSIONS: &[&str] = &["7.4", "8.0", "8.1", "8.2", "8.3", "8.4"];

/// Version used when nothing else decides.
pub const DEFAULT_VERSION: &str = "8.3";

pub fn is_supported(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// Pick the PHP version for a project.
///
/// An explicit version (anything but empty or `auto`) is returned as given.
/// Otherwise the `require.php` constraint from `composer.json` decides, and
/// [`DEFAULT_VERSION`] is used when there is no usable constraint.
pub fn select_version(project_root: &Path, explicit: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() && !explicit.eq_ignore_ascii_case("auto") {
        return explicit.to_string();
    }

    fs::read(project_root.join("composer.json"))
        .ok()
        .and_then(|data| composer_php_constraint(&data))
        .and_then(|c| resolve_constraint(&c))
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

#[derive(Deserialize)]
struct ComposerJson {
    #[serde(default)]
    require: std::collections::HashMap<String, String>,
}

fn composer_php_constraint(data: &[u8]) -> Option<String> {
    let composer: ComposerJson = serde_json::from_slice(data).ok()?;
    composer.require.get("php").cloned()
}

fn constraint_regex() -> Option<&'static Regex> {
    static CONSTRAINT: OnceLock<Option<Regex>> = OnceLock::new();
    // >=X.Y, >X.Y, ^X.Y, ~X.Y, X.Y.Z, X.Y
    CONSTRAINT
        .get_or_init(|| Regex::new(r"^(?:>=?|\^|~)?\s*(\d+)\.(\d+)(?:\.\d+)?").ok())
        .as_ref()
}

/// Resolve a composer constraint to a supported version.
///
/// Only the minimum is considered: the default version wins when it
/// satisfies it, otherwise the lowest supported version that does.
pub fn resolve_constraint(constraint: &str) -> Option<String> {
    let first = constraint.split("||").next()?.trim();
    let caps = constraint_regex()?.captures(first)?;
    let min = (caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?);

    if parse_minor(DEFAULT_VERSION) >= Some(min) {
        return Some(DEFAULT_VERSION.to_string());
    }

    SUPPORTED_VERSIONS
        .iter()
        .find(|v| parse_minor(v) >= Some(min))
        .map(|v| v.to_string())
        .or_else(|| Some(DEFAULT_VERSION.to_string()))
}

fn parse_minor(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project_with_composer(json: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("composer.json"), json).unwrap();
        dir
    }

    #[test]
    fn test_explicit_version_wins() {
        let dir = project_with_composer(r#"{"require":{"php":">=7.4"}}"#);
        assert_eq!(select_version(dir.path(), "8.1"), "8.1");
        assert_eq!(select_version(dir.path(), "auto"), "8.3");
        assert_eq!(select_version(dir.path(), ""), "8.3");
    }

    #[test]
    fn test_no_composer_json_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_version(dir.path(), "auto"), DEFAULT_VERSION);
    }

    #[test]
    fn test_invalid_composer_json_defaults() {
        let dir = project_with_composer("{ not json");
        assert_eq!(select_version(dir.path(), "auto"), DEFAULT_VERSION);

        let dir = project_with_composer(r#"{"name":"acme/app"}"#);
        assert_eq!(select_version(dir.path(), "auto"), DEFAULT_VERSION);
    }

    #[test]
    fn test_constraints_satisfied_by_default() {
        for c in [">=7.4", ">8.0", "^8.1", "~8.2", "8.2.10", "8.3", "^7.4 || ^8.0"] {
            assert_eq!(resolve_constraint(c).as_deref(), Some("8.3"), "constraint {}", c);
        }
    }

    #[test]
    fn test_constraint_above_default() {
        assert_eq!(resolve_constraint("^8.4").as_deref(), Some("8.4"));
        assert_eq!(resolve_constraint(">=8.4.1").as_deref(), Some("8.4"));
        // Nothing supported is new enough
        assert_eq!(resolve_constraint(">=9.0").as_deref(), Some("8.3"));
    }

    #[test]
    fn test_spaced_operator() {
        assert_eq!(resolve_constraint(">= 8.4").as_deref(), Some("8.4"));
        assert_eq!(resolve_constraint("^ 8.1").as_deref(), Some("8.3"));
        // Upper bound after a space is ignored
        assert_eq!(resolve_constraint(">=8.4 <9.0").as_deref(), Some("8.4"));
    }

    #[test]
    fn test_unparseable_constraint() {
        assert_eq!(resolve_constraint("*"), None);
        assert_eq!(resolve_constraint("dev-master"), None);
        assert_eq!(resolve_constraint(""), None);
    }

    #[test]
    fn test_composer_constraint_used() {
        let dir = project_with_composer(r#"{"require":{"php":"^8.4","ext-json":"*"}}"#);
        assert_eq!(select_version(dir.path(), "auto"), "8.4");
    }

    #[test]
    fn test_supported_versions() {
        assert!(is_supported("7.4"));
        assert!(is_supported("8.4"));
        assert!(!is_supported("5.6"));
        assert!(!is_supported("8"));
    }
}

//! Viewer configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the site root and is optional: stock defaults are overridden by whatever
//! keys it sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! default_book = "titus"          # Book shown when the URL names none
//!
//! [shell]
//! mount_id = "doc-target"         # Element fragments are injected into
//! fragment_root_id = "doc-root"   # Content root inside a fetched fragment
//!
//! [paths]
//! bibles_root = "/assets/bibles-json"
//!
//! [scripture]
//! left_translation = "nkjv"
//! right_translation = "nlt"
//!
//! [preferences]
//! file = ".scripture-viewer/preferences.json"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse, override just the values you want:
//!
//! ```toml
//! default_book = "jude"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::loader::LoaderSettings;
use crate::naming::{DEFAULT_BOOK, is_valid_book_slug};
use crate::prefs::ScripturePreference;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Viewer configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Book used when neither `book` nor `doc` supplies one.
    pub default_book: String,
    /// Element ids of the host page and of fetched fragments.
    pub shell: ShellConfig,
    /// Site-relative roots for fetched data.
    pub paths: PathsConfig,
    /// Default translations for the verse table.
    pub scripture: ScriptureConfig,
    /// Where the CLI keeps the preference record.
    pub preferences: PreferencesConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_book: DEFAULT_BOOK.to_string(),
            shell: ShellConfig::default(),
            paths: PathsConfig::default(),
            scripture: ScriptureConfig::default(),
            preferences: PreferencesConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_book_slug(&self.default_book) {
            return Err(ConfigError::Validation(format!(
                "default_book must be a lowercase slug, got {:?}",
                self.default_book
            )));
        }
        if self.shell.mount_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "shell.mount_id must not be empty".into(),
            ));
        }
        if self.shell.fragment_root_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "shell.fragment_root_id must not be empty".into(),
            ));
        }
        if !self.paths.bibles_root.starts_with('/') {
            return Err(ConfigError::Validation(
                "paths.bibles_root must be site-absolute (start with '/')".into(),
            ));
        }
        for (key, value) in [
            ("scripture.left_translation", &self.scripture.left_translation),
            ("scripture.right_translation", &self.scripture.right_translation),
        ] {
            if !is_valid_book_slug(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a lowercase translation key, got {value:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            fragment_root_id: self.shell.fragment_root_id.clone(),
            bibles_root: self.paths.bibles_root.trim_end_matches('/').to_string(),
        }
    }

    /// Preference used for books the reader never customised.
    pub fn default_preference(&self) -> ScripturePreference {
        ScripturePreference {
            left_translation: self.scripture.left_translation.clone(),
            right_translation: self.scripture.right_translation.clone(),
            ..ScripturePreference::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub mount_id: String,
    pub fragment_root_id: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            mount_id: "doc-target".to_string(),
            fragment_root_id: "doc-root".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Verse JSON lives at `{bibles_root}/{translation}/{book}.json`.
    pub bibles_root: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            bibles_root: "/assets/bibles-json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptureConfig {
    pub left_translation: String,
    pub right_translation: String,
}

impl Default for ScriptureConfig {
    fn default() -> Self {
        Self {
            left_translation: "nkjv".to_string(),
            right_translation: "nlt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreferencesConfig {
    /// Relative paths are resolved against the site root.
    pub file: String,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            file: ".scripture-viewer/preferences.json".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ViewerConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ViewerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ViewerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the site root.
pub fn load_config(site_root: &Path) -> Result<ViewerConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(site_root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Scripture Viewer Configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the root of the published site.
# Unknown keys will cause an error.

# Book shown when the URL carries neither `book` nor a `doc` naming one.
default_book = "titus"

# ---------------------------------------------------------------------------
# Host page
# ---------------------------------------------------------------------------
[shell]
# Id of the element fetched fragments are injected into.
mount_id = "doc-target"
# Id of the content root inside a fetched fragment. When a fragment has no
# such element, the children of <body> are mounted instead.
fragment_root_id = "doc-root"

# ---------------------------------------------------------------------------
# Data locations (site-absolute)
# ---------------------------------------------------------------------------
[paths]
# Verse data is read from {bibles_root}/{translation}/{book}.json
bibles_root = "/assets/bibles-json"

# ---------------------------------------------------------------------------
# Verse table
# ---------------------------------------------------------------------------
[scripture]
# Translations used until the reader picks otherwise.
left_translation = "nkjv"
right_translation = "nlt"

# ---------------------------------------------------------------------------
# Reader preferences (CLI only)
# ---------------------------------------------------------------------------
[preferences]
# JSON record of per-book column choices. Relative to the site root.
file = ".scripture-viewer/preferences.json"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ViewerConfig::default();
        assert_eq!(config.default_book, "titus");
        assert_eq!(config.shell.mount_id, "doc-target");
        assert_eq!(config.paths.bibles_root, "/assets/bibles-json");
    }

    #[test]
    fn default_config_validates() {
        assert!(ViewerConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config: ViewerConfig = toml::from_str(
            r#"
default_book = "jude"
[scripture]
right_translation = "esv"
"#,
        )
        .unwrap();
        assert_eq!(config.default_book, "jude");
        assert_eq!(config.scripture.left_translation, "nkjv");
        assert_eq!(config.scripture.right_translation, "esv");
        assert_eq!(config.shell, ShellConfig::default());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[shell]
mount_id = "content"
"#,
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.shell.mount_id, "content");
        assert_eq!(config.shell.fragment_root_id, "doc-root");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "default_book = [").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn loader_settings_strip_trailing_slash() {
        let mut config = ViewerConfig::default();
        config.paths.bibles_root = "/data/bibles/".into();
        let settings = config.loader_settings();
        assert_eq!(settings.bibles_root, "/data/bibles");
        assert_eq!(settings.fragment_root_id, "doc-root");
    }

    #[test]
    fn default_preference_uses_configured_translations() {
        let mut config = ViewerConfig::default();
        config.scripture.left_translation = "kjv".into();
        let pref = config.default_preference();
        assert_eq!(pref.left_translation, "kjv");
        assert_eq!(pref.right_translation, "nlt");
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_rejects_bad_default_book() {
        let mut config = ViewerConfig::default();
        config.default_book = "1 John".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_book"));
    }

    #[test]
    fn validate_rejects_empty_mount_id() {
        let mut config = ViewerConfig::default();
        config.shell.mount_id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_bibles_root() {
        let mut config = ViewerConfig::default();
        config.paths.bibles_root = "assets/bibles-json".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bibles_root"));
    }

    #[test]
    fn validate_rejects_bad_translation_key() {
        let mut config = ViewerConfig::default();
        config.scripture.right_translation = "N/LT".into();
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"default_book = "titus""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"default_book = "jude""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("default_book").unwrap().as_str(), Some("jude"));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[scripture]
left_translation = "nkjv"
right_translation = "nlt"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[scripture]
right_translation = "esv"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let scripture = merged.get("scripture").unwrap();
        assert_eq!(scripture.get("right_translation").unwrap().as_str(), Some("esv"));
        // left preserved from base
        assert_eq!(scripture.get("left_translation").unwrap().as_str(), Some("nkjv"));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
a = 1
b = 2
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(r#"a = 10"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_overlay_adds_new_keys() {
        let base: toml::Value = toml::from_str(r#"a = 1"#).unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[shell]
mount_id = "x"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        assert!(merged.get("shell").unwrap().get("mount_id").is_some());
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[shell]
mount = "doc-target"
"#;
        let result: Result<ViewerConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ViewerConfig, _> = toml::from_str("[theme]\ncolor = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "defualt_book = \"jude\"\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // resolve_config tests
    // =========================================================================

    #[test]
    fn resolve_config_with_no_overlay() {
        let config = resolve_config(stock_defaults_value(), None).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str(
            r#"
[paths]
bibles_root = "/bibles"
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.paths.bibles_root, "/bibles");
        assert_eq!(config.default_book, "titus");
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str(r#"default_book = "Not A Slug""#).unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let _: toml::Value =
            toml::from_str(stock_config_toml()).expect("stock config must be valid TOML");
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ViewerConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[shell]", "[paths]", "[scripture]", "[preferences]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in ["default_book", "shell", "paths", "scripture", "preferences"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}

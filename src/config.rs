//! Settings module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a user config file, which is in turn overridden by the
//! environment for the one setting that commonly differs per machine.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [cache]
//! root = ".cache/remote_cache"    # Placeholder payloads live in <root>/images/
//! persist = "strict"              # "strict" | "best-effort"
//!
//! [api]
//! host = "images.ctfassets.net"   # Placeholders are only fetched from this host
//!
//! [placeholder]
//! width = 20                      # Width of the low-resolution rendition (px)
//! neutral_color = "rgba(0,0,0,0.5)"
//! fetch_timeout_secs = 30
//! ```
//!
//! ## Environment
//!
//! `IMAGE_DESCRIPTORS_CACHE_DIR` replaces `cache.root` (see
//! [`Settings::apply_env`]). Placeholder payloads never go stale, so some
//! deployments keep them outside the regular build cache.
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::PersistPolicy;
use crate::imaging::MAX_DIMENSION;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`CacheSettings::root`].
pub const CACHE_DIR_ENV: &str = "IMAGE_DESCRIPTORS_CACHE_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Disk cache location and write-failure policy.
    pub cache: CacheSettings,
    /// Image transformation API.
    pub api: ApiSettings,
    /// Placeholder rendition and fallbacks.
    pub placeholder: PlaceholderSettings,
}

impl Settings {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "cache.root must not be empty".into(),
            ));
        }
        if self.api.host.trim().is_empty() {
            return Err(ConfigError::Validation("api.host must not be empty".into()));
        }
        if self.placeholder.width == 0 || self.placeholder.width > MAX_DIMENSION {
            return Err(ConfigError::Validation(format!(
                "placeholder.width must be 1-{MAX_DIMENSION}"
            )));
        }
        if self.placeholder.neutral_color.trim().is_empty() {
            return Err(ConfigError::Validation(
                "placeholder.neutral_color must not be empty".into(),
            ));
        }
        if self.placeholder.fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "placeholder.fetch_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.cache.root = PathBuf::from(dir);
        }
        self
    }
}

/// Disk cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache root; payload files go in its `images/` subdirectory.
    pub root: PathBuf,
    /// What to do when a fetched payload cannot be written.
    pub persist: PersistPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".cache/remote_cache"),
            persist: PersistPolicy::Strict,
        }
    }
}

/// Remote image API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    /// Host serving transformable assets.
    pub host: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "images.ctfassets.net".to_string(),
        }
    }
}

/// Placeholder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderSettings {
    /// Width of the blurred rendition, in pixels.
    pub width: u32,
    /// Color used when no dominant color can be computed.
    pub neutral_color: String,
    /// Network timeout for one placeholder fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for PlaceholderSettings {
    fn default() -> Self {
        Self {
            width: 20,
            neutral_color: "rgba(0,0,0,0.5)".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Settings::default())?)
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
/// Returns `Err` if the file exists but contains invalid TOML.
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
) -> Result<Settings, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. Environment overrides are not applied; chain
/// [`Settings::apply_env`] for that.
pub fn load_config(root: &Path) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Descriptors Configuration
# ===============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Disk cache
# ---------------------------------------------------------------------------
[cache]
# Cache root. Placeholder payloads are written to <root>/images/<sha1>.base64.
# Overridden by the IMAGE_DESCRIPTORS_CACHE_DIR environment variable.
root = ".cache/remote_cache"

# What happens when a fetched placeholder cannot be written to disk:
#   "strict"      - the fetch fails and nothing is cached (surfaces broken dirs)
#   "best-effort" - the failure is logged and the placeholder is still used
persist = "strict"

# ---------------------------------------------------------------------------
# Image transformation API
# ---------------------------------------------------------------------------
[api]
# Only assets served from this host get blurred placeholders.
host = "images.ctfassets.net"

# ---------------------------------------------------------------------------
# Placeholders
# ---------------------------------------------------------------------------
[placeholder]
# Width in pixels of the low-resolution rendition that is inlined as base64.
width = 20

# Solid color used when a dominant color cannot be computed.
neutral_color = "rgba(0,0,0,0.5)"

# Network timeout for a single placeholder fetch, in seconds.
fetch_timeout_secs = 30
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.cache.root, PathBuf::from(".cache/remote_cache"));
        assert_eq!(settings.cache.persist, PersistPolicy::Strict);
        assert_eq!(settings.api.host, "images.ctfassets.net");
        assert_eq!(settings.placeholder.width, 20);
        assert_eq!(settings.placeholder.neutral_color, "rgba(0,0,0,0.5)");
        assert_eq!(settings.placeholder.fetch_timeout_secs, 30);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[cache]
persist = "best-effort"
"#;
        let settings: Settings = toml::from_str(toml).unwrap();
        // Overridden value
        assert_eq!(settings.cache.persist, PersistPolicy::BestEffort);
        // Default values preserved
        assert_eq!(settings.cache.root, PathBuf::from(".cache/remote_cache"));
        assert_eq!(settings.placeholder.width, 20);
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[placeholder]
widht = 40
"#;
        assert!(toml::from_str::<Settings>(toml).is_err());
    }

    #[test]
    fn stock_config_toml_matches_defaults() {
        let settings: Settings = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let settings = load_config(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[cache]
root = "/var/cache/images"

[placeholder]
width = 32
"#,
        )
        .unwrap();

        let settings = load_config(tmp.path()).unwrap();
        assert_eq!(settings.cache.root, PathBuf::from("/var/cache/images"));
        assert_eq!(settings.placeholder.width, 32);
        // Unspecified values should be defaults
        assert_eq!(settings.api.host, "images.ctfassets.net");
        assert_eq!(settings.placeholder.fetch_timeout_secs, 30);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[placeholder]\nwidth = 0\n",
        )
        .unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn validate_default_ok() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn validate_placeholder_width_over_api_limit() {
        let mut settings = Settings::default();
        settings.placeholder.width = 4001;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_empty_host() {
        let mut settings = Settings::default();
        settings.api.host = " ".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_zero_timeout() {
        let mut settings = Settings::default();
        settings.placeholder.fetch_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_overlay_wins_and_base_preserved() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[api]\nhost = \"img.example.com\"\n").unwrap();

        let settings: Settings = merge_toml(base, overlay).try_into().unwrap();
        assert_eq!(settings.api.host, "img.example.com");
        assert_eq!(settings.placeholder.width, 20);
    }

    // =========================================================================
    // apply_env
    // =========================================================================

    #[test]
    fn env_overrides_cache_root() {
        let settings = Settings::default().apply_env_from(|key| {
            (key == CACHE_DIR_ENV).then(|| "/tmp/placeholders".to_string())
        });
        assert_eq!(settings.cache.root, PathBuf::from("/tmp/placeholders"));
    }

    #[test]
    fn empty_env_value_ignored() {
        let settings = Settings::default().apply_env_from(|_| Some(String::new()));
        assert_eq!(settings.cache.root, PathBuf::from(".cache/remote_cache"));
    }
}

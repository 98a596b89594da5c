//! Round-trip configuration.
//!
//! Handles loading, validating, and merging `crf-roundtrip.toml`. Stock
//! defaults are the base layer; a user file overrides just the keys it names,
//! and CLI flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! crf = 28                  # Constant Rate Factor, 0 (best) to 51 (worst)
//! backend = "auto"          # auto | native | ffmpeg
//!
//! [native]
//! speed = 10                # rav1e speed preset, 0 (slowest) to 10 (fastest)
//!
//! [ffmpeg]
//! program = "ffmpeg"        # Binary name or path
//! codec = "libx265"         # Passed to -c:v
//! timeout_secs = 120        # Per invocation; 0 disables the timeout
//! # scratch_dir = "/tmp"    # Parent of per-image temp dirs (default: system temp)
//! ```
//!
//! Unknown keys are rejected to catch typos early. `crf` is deliberately not
//! range-checked: out-of-range values go to the codec as-is.

use crate::codec::{BackendChoice, BackendError, Crf, FfmpegBackend, RoundTripBackend};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up by [`load_config`] when given a directory.
pub const CONFIG_FILE_NAME: &str = "crf-roundtrip.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoundTripConfig {
    /// Constant Rate Factor applied to every image of a batch.
    pub crf: Crf,
    /// Backend preference, resolved once at startup.
    pub backend: BackendChoice,
    /// In-process codec settings.
    pub native: NativeConfig,
    /// External ffmpeg settings.
    pub ffmpeg: FfmpegConfig,
}

impl Default for RoundTripConfig {
    fn default() -> Self {
        Self {
            crf: Crf::default(),
            backend: BackendChoice::Auto,
            native: NativeConfig::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl RoundTripConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.native.speed > 10 {
            return Err(ConfigError::Validation(
                "native.speed must be 0-10".into(),
            ));
        }
        if self.ffmpeg.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ffmpeg.program must not be empty".into(),
            ));
        }
        if self.ffmpeg.codec.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ffmpeg.codec must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The ffmpeg backend described by the `[ffmpeg]` section.
    pub fn ffmpeg_backend(&self) -> FfmpegBackend {
        FfmpegBackend::new()
            .with_program(&self.ffmpeg.program)
            .with_codec(&self.ffmpeg.codec)
            .with_timeout(self.ffmpeg.timeout())
            .with_scratch_root(self.ffmpeg.scratch_dir.clone())
    }

    /// Resolve [`backend`](Self::backend) into a concrete backend.
    pub fn select_backend(&self) -> Result<Box<dyn RoundTripBackend>, BackendError> {
        crate::codec::select_backend(self.backend, self.native.speed, self.ffmpeg_backend())
    }
}

/// In-process codec settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeConfig {
    /// rav1e speed preset (0 = slowest/best, 10 = fastest).
    pub speed: u8,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self { speed: 10 }
    }
}

/// External ffmpeg settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FfmpegConfig {
    /// Binary name (looked up on PATH) or path.
    pub program: String,
    /// Encoder passed to `-c:v`.
    pub codec: String,
    /// Per-invocation timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
    /// Parent directory for per-image scratch directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl FfmpegConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            program: crate::codec::ffmpeg::DEFAULT_PROGRAM.to_string(),
            codec: crate::codec::ffmpeg::DEFAULT_CODEC.to_string(),
            timeout_secs: crate::codec::ffmpeg::DEFAULT_TIMEOUT.as_secs(),
            scratch_dir: None,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(RoundTripConfig::default()).expect("default config must serialize")
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

/// Read a config file as a raw TOML value.
///
/// `path` may be the file itself or a directory containing
/// [`CONFIG_FILE_NAME`]. Returns `Ok(None)` if no file exists there.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = if path.is_dir() {
        path.join(CONFIG_FILE_NAME)
    } else {
        path.to_path_buf()
    };
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
) -> Result<RoundTripConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RoundTripConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file (or a directory holding [`CONFIG_FILE_NAME`]).
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<RoundTripConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# crf-roundtrip Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Constant Rate Factor for every image of a batch.
# 0 = highest fidelity, 51 = strongest degradation. Values outside 0-51 are
# handed to the codec unchanged.
crf = 28

# Which codec path to use:
#   "auto"   - in-process AV1 when compiled in, otherwise ffmpeg
#   "native" - in-process AV1 only (error if not compiled in)
#   "ffmpeg" - always shell out to ffmpeg
backend = "auto"

# ---------------------------------------------------------------------------
# In-process AV1 codec (rav1e encode, rav1d decode)
# ---------------------------------------------------------------------------
[native]
# rav1e speed preset, 0 (slowest) to 10 (fastest). CRF alone sets quality.
speed = 10

# ---------------------------------------------------------------------------
# External ffmpeg
# ---------------------------------------------------------------------------
[ffmpeg]
# Binary name (looked up on PATH) or absolute path.
program = "ffmpeg"

# Video encoder passed to -c:v.
codec = "libx265"

# Seconds each ffmpeg invocation may run before it is killed. 0 = no limit.
timeout_secs = 120

# Parent directory for per-image scratch directories.
# Omit or comment out to use the system temp directory.
# scratch_dir = "/tmp"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = RoundTripConfig::default();
        assert_eq!(config.crf, Crf::new(28));
        assert_eq!(config.backend, BackendChoice::Auto);
        assert_eq!(config.native.speed, 10);
        assert_eq!(config.ffmpeg.program, "ffmpeg");
        assert_eq!(config.ffmpeg.codec, "libx265");
        assert_eq!(config.ffmpeg.timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.ffmpeg.scratch_dir, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
crf = 40

[ffmpeg]
codec = "libx264"
"#;
        let config: RoundTripConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.crf, Crf::new(40));
        assert_eq!(config.ffmpeg.codec, "libx264");
        // Unspecified defaults preserved
        assert_eq!(config.ffmpeg.program, "ffmpeg");
        assert_eq!(config.native.speed, 10);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config: RoundTripConfig = toml::from_str("[ffmpeg]\ntimeout_secs = 0").unwrap();
        assert_eq!(config.ffmpeg.timeout(), None);
    }

    #[test]
    fn out_of_range_crf_is_accepted() {
        let config: RoundTripConfig = toml::from_str("crf = 99").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.crf.value(), 99);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.crf, Crf::new(28));
        assert_eq!(config.backend, BackendChoice::Auto);
    }

    #[test]
    fn load_config_reads_file_in_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
backend = "ffmpeg"

[ffmpeg]
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.backend, BackendChoice::Ffmpeg);
        assert_eq!(config.ffmpeg.timeout_secs, 5);
        assert_eq!(config.ffmpeg.codec, "libx265");
    }

    #[test]
    fn load_config_reads_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "crf = 12\n[native]\nspeed = 4\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.crf, Crf::new(12));
        assert_eq!(config.native.speed, 4);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[native]\nspeed = 11\n").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("crf = 28").unwrap();
        let overlay: toml::Value = toml::from_str("crf = 35").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("crf").unwrap().as_integer(), Some(35));
    }

    #[test]
    fn merge_toml_table_merge_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
[ffmpeg]
program = "ffmpeg"
codec = "libx265"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[ffmpeg]
codec = "libx264"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let ffmpeg = merged.get("ffmpeg").unwrap();
        assert_eq!(ffmpeg.get("codec").unwrap().as_str(), Some("libx264"));
        assert_eq!(ffmpeg.get("program").unwrap().as_str(), Some("ffmpeg"));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<RoundTripConfig, _> = toml::from_str("qualty = 90");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<RoundTripConfig, _> = toml::from_str("[ffmpeg]\nbinary = \"x\"");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(RoundTripConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_empty_program() {
        let mut config = RoundTripConfig::default();
        config.ffmpeg.program = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_codec() {
        let mut config = RoundTripConfig::default();
        config.ffmpeg.codec = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn select_backend_honors_ffmpeg_choice() {
        let config: RoundTripConfig = toml::from_str(r#"backend = "ffmpeg""#).unwrap();
        assert_eq!(config.select_backend().unwrap().name(), "ffmpeg");
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: RoundTripConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.crf, Crf::new(28));
        assert_eq!(config.backend, BackendChoice::Auto);
        assert_eq!(config.native.speed, 10);
        assert_eq!(config.ffmpeg.program, "ffmpeg");
        assert_eq!(config.ffmpeg.codec, "libx265");
        assert_eq!(config.ffmpeg.timeout_secs, 120);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        assert!(val.get("crf").is_some());
        assert!(val.get("backend").is_some());
        assert!(val.get("native").is_some());
        assert!(val.get("ffmpeg").is_some());
    }
}

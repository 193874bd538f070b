//! Collector configuration.
//!
//! Resolved once at process start and handed to collectors by value; nothing
//! reads it again during a poll.
//!
//! ```yaml
//! namespace: node
//! nvgpu:
//!   sysinfo: true
//!   gpuinfo: true
//!   faninfo: false
//! ```

use crate::error::{CollectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-family enable switches of the NVIDIA GPU collector.
///
/// Families without a switch are always collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvGpuConfig {
    /// Emit the system-wide `sysinfo` family.
    #[serde(default)]
    pub sysinfo: bool,

    /// Emit the per-device `gpuinfo` family.
    #[serde(default)]
    pub gpuinfo: bool,

    /// Emit the fan families.
    #[serde(default)]
    pub faninfo: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Metric namespace, the first segment of every metric name.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// NVIDIA GPU collector settings.
    #[serde(default)]
    pub nvgpu: NvGpuConfig,
}

fn default_namespace() -> String {
    "node".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self { namespace: default_namespace(), nvgpu: NvGpuConfig::default() }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| CollectorError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map_or(0, |l| l.line());
            CollectorError::ConfigParse { line, message: e.to_string() }
        })
    }

    /// Loads configuration with fallback to defaults.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Returns a copy with every optional family enabled.
    #[must_use]
    pub fn with_all_families(mut self) -> Self {
        self.nvgpu = NvGpuConfig { sysinfo: true, gpuinfo: true, faninfo: true };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::new();

        assert_eq!(config.namespace, "node");
        assert!(!config.nvgpu.sysinfo);
        assert!(!config.nvgpu.gpuinfo);
        assert!(!config.nvgpu.faninfo);
    }

    #[test]
    fn test_config_parse_empty_document() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_parse_full() {
        let yaml = r#"
namespace: host
nvgpu:
  sysinfo: true
  gpuinfo: false
  faninfo: true
"#;

        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.namespace, "host");
        assert!(config.nvgpu.sysinfo);
        assert!(!config.nvgpu.gpuinfo);
        assert!(config.nvgpu.faninfo);
    }

    #[test]
    fn test_config_parse_partial_switches() {
        let config = Config::parse("nvgpu:\n  gpuinfo: true\n").unwrap();

        assert_eq!(config.namespace, "node");
        assert!(config.nvgpu.gpuinfo);
        assert!(!config.nvgpu.sysinfo);
    }

    #[test]
    fn test_config_parse_error_includes_line() {
        let yaml = r#"
namespace: node
nvgpu:
  sysinfo: not_a_bool
"#;

        let err = Config::parse(yaml).unwrap_err();
        let display = err.to_string();
        assert!(display.contains('4'), "Error should include line number: {display}");
    }

    #[test]
    fn test_config_load_missing_file() {
        let err = Config::load("/nonexistent/nvgpu.yaml").unwrap_err();
        assert!(matches!(err, CollectorError::ConfigNotFound(_)));
    }

    #[test]
    fn test_config_load_or_default() {
        let config = Config::load_or_default("/nonexistent/path");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_with_all_families() {
        let config = Config::new().with_all_families();
        assert!(config.nvgpu.sysinfo && config.nvgpu.gpuinfo && config.nvgpu.faninfo);
    }
}

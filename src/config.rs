//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `kiosk.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: how often the directory is re-checked.
//!     - DirectoryConfig: fixed csv url, or a template keyed by session id.
//!     - IdentityConfig: fallback token prefix and hardware serial paths.
//!     - StorageConfig: where the local key-value store lives.
//!     - ServerConfig: bind address of the kiosk shell.
//!     - LoggingConfig: default tracing filter.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct KioskConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        // 15 minutes
        Self { interval_seconds: 15 * 60 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    /// fixed csv location; wins over `template` when set
    #[serde(default)]
    pub url: Option<String>,
    /// location with a `{session}` placeholder for the session identifier
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_template() -> String {
    "https://docs.google.com/spreadsheets/d/e/{session}/pub?gid=0&single=true&output=csv".to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            template: default_template(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_prefix")]
    pub fallback_prefix: String,
    #[serde(default = "default_serial_paths")]
    pub serial_paths: Vec<String>,
}

fn default_prefix() -> String {
    "GIPS".to_string()
}

fn default_serial_paths() -> Vec<String> {
    vec![
        "/sys/firmware/devicetree/base/serial-number".to_string(),
        "/proc/cpuinfo".to_string(),
        "/sys/class/dmi/id/product_serial".to_string(),
    ]
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            fallback_prefix: default_prefix(),
            serial_paths: default_serial_paths(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: "data/kiosk-store.json".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl KioskConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: KioskConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("kiosk.toml"),
            std::path::PathBuf::from("..").join("config").join("kiosk.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let directory = self.directory.url.as_deref().unwrap_or(&self.directory.template);
        println!("┌─────────────────────────────────────────┐");
        println!("│          KIOSK CONFIGURATION            │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Directory: {}", directory);
        println!("│ Poll Interval: {}s", self.polling.interval_seconds);
        println!("│ Store: {}", self.storage.path);
        println!("│ Shell: http://{}", self.server.bind);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: KioskConfig = toml::from_str("").unwrap();
        assert_eq!(config.polling.interval_seconds, 900);
        assert_eq!(config.identity.fallback_prefix, "GIPS");
        assert!(config.directory.url.is_none());
        assert!(config.directory.template.contains("{session}"));
    }

    #[test]
    fn test_partial_sections() {
        let config: KioskConfig = toml::from_str(
            r#"
[polling]
interval_seconds = 60

[directory]
url = "https://example.com/devices.csv"
timeout_seconds = 10

[identity]
serial_paths = ["/tmp/serial"]
"#,
        )
        .unwrap();
        assert_eq!(config.polling.interval_seconds, 60);
        assert_eq!(config.directory.url.as_deref(), Some("https://example.com/devices.csv"));
        assert_eq!(config.directory.timeout_seconds, Some(10));
        assert_eq!(config.identity.fallback_prefix, "GIPS");
        assert_eq!(config.identity.serial_paths, vec!["/tmp/serial".to_string()]);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(&path, "[polling]\ninterval_seconds = \"soon\"\n").unwrap();
        let err = KioskConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}

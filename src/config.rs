//! Configuration system for the `crashdetective` tool.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::signal::SignalMatch;

/// Errors from reading the config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings for the long-running monitor
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between "still running" status lines (0 disables them)
    pub heartbeat_secs: u64,
    /// Milliseconds between checks on the debugger process
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            poll_interval_ms: 100,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// GDB executable (looked up on PATH unless absolute)
    pub gdb: PathBuf,
    /// Time limit for launch mode, in seconds (0 means no limit)
    pub timeout_secs: u64,
    /// Require signal names to stand alone instead of matching inside words
    pub strict_signals: bool,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gdb: PathBuf::from("gdb"),
            timeout_secs: 30,
            strict_signals: false,
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    ///
    /// A missing file is silent; an unreadable or malformed one is logged.
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from_path(&path).unwrap_or_else(|err| {
                log::warn!("{err}; using defaults");
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    /// Load config from a specific path; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path (~/.config/crashdetective/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("crashdetective").join("config.toml"))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            env::var("CRASHDETECTIVE_GDB").ok(),
            env::var("CRASHDETECTIVE_TIMEOUT").ok(),
        );
    }

    fn apply_overrides(&mut self, gdb: Option<String>, timeout: Option<String>) {
        if let Some(gdb) = gdb.filter(|s| !s.trim().is_empty()) {
            self.gdb = PathBuf::from(gdb);
        }
        if let Some(timeout) = timeout {
            match timeout.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => log::warn!("ignoring CRASHDETECTIVE_TIMEOUT={timeout:?}: not a number"),
            }
        }
    }

    pub fn signal_match(&self) -> SignalMatch {
        if self.strict_signals {
            SignalMatch::WordBoundary
        } else {
            SignalMatch::Substring
        }
    }
}

/// Generate default config as TOML string
pub fn generate_default_config() -> String {
    r#"# crashdetective configuration
# Place this file at ~/.config/crashdetective/config.toml

# GDB executable to run (searched on PATH unless absolute)
gdb = "gdb"

# Seconds to wait for a launched program before stopping it (0 = no limit)
timeout_secs = 30

# Only count signal names like SIGFPE when they stand alone,
# not inside longer words or file names
strict_signals = false

[monitor]
# Seconds between "still running" messages in --long mode (0 = never)
heartbeat_secs = 30

# Milliseconds between checks on the debugger process
poll_interval_ms = 100

# Environment variable overrides:
# CRASHDETECTIVE_GDB=/opt/gdb/bin/gdb  - GDB executable
# CRASHDETECTIVE_TIMEOUT=60            - launch timeout in seconds
# NO_COLOR=1                           - disable colored output
"#
    .to_string()
}

/// Print the default config to stdout
pub fn print_default_config() {
    print!("{}", generate_default_config());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gdb, PathBuf::from("gdb"));
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.strict_signals);
        assert_eq!(config.monitor.heartbeat_secs, 30);
        assert_eq!(config.signal_match(), SignalMatch::Substring);
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config = Config::from_toml(&generate_default_config()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = Config::from_toml("timeout_secs = 5\n[monitor]\nheartbeat_secs = 0\n").unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.gdb, PathBuf::from("gdb"));
        assert_eq!(config.monitor.heartbeat_secs, 0);
        assert_eq!(config.monitor.poll_interval_ms, 100);
    }

    #[test]
    fn test_strict_signals_switches_matching() {
        let config = Config::from_toml("strict_signals = true").unwrap();
        assert_eq!(config.signal_match(), SignalMatch::WordBoundary);
    }

    #[test]
    fn test_load_from_missing_path_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gdb = \"/opt/gdb/bin/gdb\"").unwrap();
        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.gdb, PathBuf::from("/opt/gdb/bin/gdb"));
    }

    #[test]
    fn test_load_from_path_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = \"soon\"").unwrap();
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("/usr/local/bin/gdb".to_string()), Some(" 90 ".to_string()));
        assert_eq!(config.gdb, PathBuf::from("/usr/local/bin/gdb"));
        assert_eq!(config.timeout_secs, 90);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(Some("  ".to_string()), Some("forever".to_string()));
        assert_eq!(config, Config::default());
    }
}

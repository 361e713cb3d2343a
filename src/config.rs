//! Configuration file support
//!
//! `atflash.toml` supplies defaults for everything the command line can
//! override. The file is only ever read.
//!
//! ```toml
//! packs = "C:/Program Files (x86)/Atmel/Studio/7.0/packs"
//! atprogram = "C:/Program Files (x86)/Atmel/Studio/7.0/atbackend/atprogram.exe"
//! programmer = "atmelice"
//! interface = "UPDI"
//! target = "ATtiny1614"
//! timeout_secs = 120
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use atflash_runner::DEFAULT_PROGRAM;
use serde::Deserialize;
use thiserror::Error;

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "atflash.toml";

/// Device pack directory used when none is configured
pub const DEFAULT_PACKS_DIR: &str = "./packs";

/// Programmer used when none is configured
pub const DEFAULT_PROGRAMMER: &str = "atmelice";

/// Interface used when none is configured
pub const DEFAULT_INTERFACE: &str = "ISP";

/// Target used when none is configured
pub const DEFAULT_TARGET: &str = "ATmega32U4";

/// Errors loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Raw contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub packs: Option<PathBuf>,
    pub atprogram: Option<PathBuf>,
    pub programmer: Option<String>,
    pub interface: Option<String>,
    pub target: Option<String>,
    /// Per-invocation timeout; 0 or absent disables it
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parse config text; `path` is only used for error messages
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, path)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Find the config to use
    ///
    /// An explicit path must exist. Otherwise `atflash.toml` in `dir` is
    /// used if present, and built-in defaults if not.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            log::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            Ok(Self::default())
        }
    }
}

/// Effective settings after applying defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub packs: PathBuf,
    pub atprogram: PathBuf,
    pub programmer: String,
    pub interface: String,
    pub target: String,
    pub timeout: Option<Duration>,
}

impl From<FileConfig> for Settings {
    fn from(file: FileConfig) -> Self {
        Self {
            packs: file
                .packs
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PACKS_DIR)),
            atprogram: file
                .atprogram
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM)),
            programmer: file
                .programmer
                .unwrap_or_else(|| DEFAULT_PROGRAMMER.to_string()),
            interface: file
                .interface
                .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            target: file.target.unwrap_or_else(|| DEFAULT_TARGET.to_string()),
            timeout: file
                .timeout_secs
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from(FileConfig::default());
        assert_eq!(settings.packs, PathBuf::from("./packs"));
        assert_eq!(settings.atprogram, PathBuf::from(DEFAULT_PROGRAM));
        assert_eq!(settings.programmer, "atmelice");
        assert_eq!(settings.interface, "ISP");
        assert_eq!(settings.target, "ATmega32U4");
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn test_parse_full() {
        let text = r#"
            packs = "/opt/packs"
            atprogram = "/opt/atbackend/atprogram"
            programmer = "jtagice3"
            interface = "UPDI"
            target = "ATtiny1614"
            timeout_secs = 90
        "#;
        let settings = Settings::from(FileConfig::parse(text, Path::new("t.toml")).unwrap());
        assert_eq!(settings.packs, PathBuf::from("/opt/packs"));
        assert_eq!(settings.programmer, "jtagice3");
        assert_eq!(settings.interface, "UPDI");
        assert_eq!(settings.target, "ATtiny1614");
        assert_eq!(settings.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_zero_timeout_disabled() {
        let config = FileConfig::parse("timeout_secs = 0", Path::new("t.toml")).unwrap();
        assert_eq!(Settings::from(config).timeout, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FileConfig::parse("programer = \"avrdragon\"", Path::new("t.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            FileConfig::discover(None, dir.path()).unwrap(),
            FileConfig::default()
        );

        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "interface = \"PDI\"").unwrap();
        let found = FileConfig::discover(None, dir.path()).unwrap();
        assert_eq!(found.interface.as_deref(), Some("PDI"));

        let missing = dir.path().join("other.toml");
        let err = FileConfig::discover(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

//! Runtime configuration.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── cycles     # [cycles]
//! │   └── hot        # [hot]
//! ├── error          # ConfigError
//! └── mod.rs         # RuntimeConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section     | Purpose                                     |
//! |-------------|---------------------------------------------|
//! | `[hot]`     | Whether hot updates are accepted            |
//! | `[cycles]`  | Require-cycle warnings and ignore patterns  |

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{CycleConfig, HotConfig, NODE_MODULES_PATTERN};

use std::fs;
use std::path::Path;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Enable `debug!` output.
    pub verbose: bool,

    /// Hot-update settings
    pub hot: HotConfig,

    /// Require-cycle warning settings
    pub cycles: CycleConfig,
}

impl RuntimeConfig {
    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file, warning about unknown fields.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            crate::log!(
                "config";
                "ignoring unknown fields in {}: {}",
                path.display(),
                ignored.join(", ")
            );
        }
        Ok(config)
    }

    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Check the configuration and compile it for the runtime.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        // Compile one by one so the error names the offending pattern
        for pattern in &self.cycles.ignore {
            regex::Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        let cycle_ignore =
            RegexSet::new(&self.cycles.ignore).map_err(|source| ConfigError::Pattern {
                pattern: self.cycles.ignore.join(", "),
                source,
            })?;

        Ok(Settings {
            verbose: self.verbose,
            hot_enabled: self.hot.enabled,
            warn_cycles: self.cycles.warn,
            cycle_ignore,
        })
    }
}

// ============================================================================
// compiled settings
// ============================================================================

/// Validated configuration as consumed by the runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    pub verbose: bool,
    pub hot_enabled: bool,
    pub warn_cycles: bool,
    pub cycle_ignore: RegexSet,
}

impl Settings {
    /// Whether a cycle through these unit names is suppressed.
    pub fn is_cycle_ignored<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names
            .iter()
            .any(|name| self.cycle_ignore.is_match(name.as_ref()))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: false,
            hot_enabled: true,
            warn_cycles: true,
            cycle_ignore: RegexSet::new([NODE_MODULES_PATTERN])
                .unwrap_or_else(|_| RegexSet::empty()),
        }
    }
}

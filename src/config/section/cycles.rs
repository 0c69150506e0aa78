//! `[cycles]` section configuration.
//!
//! Controls require-cycle warnings. A cycle is reported unless any unit
//! name along it matches one of the `ignore` patterns.
//!
//! # Example
//!
//! ```toml
//! [cycles]
//! warn = true
//! ignore = ['(^|/|\\)node_modules($|/|\\)', '^vendor/']
//! ```

use serde::{Deserialize, Serialize};

/// Default ignore pattern: third-party packages.
pub const NODE_MODULES_PATTERN: &str = r"(^|/|\\)node_modules($|/|\\)";

/// Require-cycle warning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Report require cycles.
    pub warn: bool,

    /// Regex patterns matched against unit names along a cycle.
    pub ignore: Vec<String>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            warn: true,
            ignore: vec![NODE_MODULES_PATTERN.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    #[test]
    fn test_cycle_config() {
        let config =
            RuntimeConfig::from_str("[cycles]\nwarn = false\nignore = ['^vendor/']").unwrap();
        assert!(!config.cycles.warn);
        assert_eq!(config.cycles.ignore, ["^vendor/"]);
    }

    #[test]
    fn test_cycle_config_defaults() {
        let config = RuntimeConfig::from_str("").unwrap();
        assert!(config.cycles.warn);
        assert_eq!(config.cycles.ignore, [NODE_MODULES_PATTERN]);
    }

    #[test]
    fn test_cycle_config_empty_ignore_list() {
        let config = RuntimeConfig::from_str("[cycles]\nignore = []").unwrap();
        assert!(config.cycles.ignore.is_empty());
    }
}

//! `[hot]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [hot]
//! enabled = true    # Accept hot updates (false: every edit is a full reload)
//! ```

use serde::{Deserialize, Serialize};

/// Hot-update settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotConfig {
    /// Accept hot updates.
    pub enabled: bool,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

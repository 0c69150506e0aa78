//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid pattern `{pattern}` in [cycles].ignore")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

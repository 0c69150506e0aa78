//! Error types.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::unit::UnitId;

// ============================================================================
// SharedError
// ============================================================================

/// A factory error, shared so that every replay is the same error object.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Whether both handles point at the same stored error.
    #[inline]
    pub fn ptr_eq(&self, other: &SharedError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for SharedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.chain().nth(1)
    }
}

// ============================================================================
// LoadError
// ============================================================================

/// Errors surfaced by `load` and the interop helpers.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Not registered and not reserved by any segment. Never cached.
    #[error("requiring unknown unit \"{id}\"")]
    UnknownUnit { id: UnitId },

    /// The unit's factory failed; replayed verbatim on later loads.
    #[error("unit \"{unit}\" failed to evaluate: {error}")]
    Factory {
        unit: UnitId,
        #[source]
        error: SharedError,
    },

    /// Positional require past the end of the dependency map.
    #[error("unit \"{unit}\" has no dependency at index {index}")]
    DependencyIndex { unit: UnitId, index: usize },
}

impl LoadError {
    /// The stored factory error, if this is a factory failure.
    pub fn shared(&self) -> Option<&SharedError> {
        match self {
            Self::Factory { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// SegmentError
// ============================================================================

/// Segment registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("registerSegment: expected no local ids for the main segment")]
    MainSegmentWithIds,

    #[error("registerSegment: expected local ids for segment #{0}")]
    MissingIds(u16),
}

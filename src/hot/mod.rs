//! Hot-update coordinator.
//!
//! Applies an edit to one unit by re-running the smallest set of units that
//! keeps every live export consistent, or rejects it in favor of a full
//! reload.
//!
//! # Flow
//!
//! ```text
//! accept_update(def, inverse)
//!     │
//!     ├─ preconditions ─▶ Registered / Replaced / FullReload(Disabled, ...)
//!     │
//!     ├─ plan (no factory runs)
//!     │     ├─ cycle reachable from the edit ──▶ FullReload(DependencyCycle)
//!     │     └─ path to a root, no boundary ────▶ FullReload(NoRootBoundary)
//!     │
//!     └─ commit (topological order)
//!           ├─ re-run, dispose old, accept new
//!           ├─ stable boundary ─▶ stop this path
//!           ├─ factory failed ──▶ report, keep last good exports,
//!           │                    skip everything above it
//!           └─ bubbled to root ─▶ FullReload after the fact
//! ```
//!
//! # Modules
//!
//! - `plan` - Topological ordering, cycle and boundary checks
//! - `commit` - Re-running units and deciding propagation
//! - `listener` - Update events and the fatal-error sink

mod commit;
mod listener;
mod plan;


pub use listener::{HotListener, LogListener};

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::Runtime;
use crate::unit::{UnitId, Value};

// =============================================================================
// Boundary classification
// =============================================================================

/// Fingerprint of a boundary's exported shape.
///
/// Typically the names of the bindings the classifier recognized, but the
/// core treats it as opaque and only ever compares two of them through
/// [`BoundaryClassifier::same_shape`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<String>);

impl Signature {
    pub fn new<I>(parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    #[inline]
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

/// Decides whether a unit's exports make it an update boundary.
pub trait BoundaryClassifier {
    /// `Some` when `exports` can absorb updates of the unit that produced it.
    fn classify(&self, exports: &Value) -> Option<Signature>;

    /// Whether a boundary may keep absorbing updates across two versions.
    fn same_shape(&self, prev: &Signature, next: &Signature) -> bool {
        prev == next
    }
}

impl<F> BoundaryClassifier for F
where
    F: Fn(&Value) -> Option<Signature>,
{
    fn classify(&self, exports: &Value) -> Option<Signature> {
        self(exports)
    }
}

// =============================================================================
// Inverse dependencies
// =============================================================================

/// Unit id -> ids of the units that currently depend on it.
///
/// Supplied by the caller with each update. A unit without an entry (or with
/// an empty one) is a root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InverseDependencyMap(FxHashMap<UnitId, Vec<UnitId>>);

impl InverseDependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dependents of `id`.
    pub fn insert<I>(&mut self, id: impl Into<UnitId>, dependents: I)
    where
        I: IntoIterator,
        I::Item: Into<UnitId>,
    {
        self.0
            .insert(id.into(), dependents.into_iter().map(Into::into).collect());
    }

    /// Record that `dependent` depends on `dependency`.
    pub fn add_edge(&mut self, dependency: impl Into<UnitId>, dependent: impl Into<UnitId>) {
        let dependents = self.0.entry(dependency.into()).or_default();
        let dependent = dependent.into();
        if !dependents.contains(&dependent) {
            dependents.push(dependent);
        }
    }

    /// Parse the bundler's JSON shape, e.g. `{ "1": [0], "0": [] }`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    #[inline]
    pub fn dependents(&self, id: &UnitId) -> &[UnitId] {
        self.0.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, I> FromIterator<(K, I)> for InverseDependencyMap
where
    K: Into<UnitId>,
    I: IntoIterator,
    I::Item: Into<UnitId>,
{
    fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (id, dependents) in iter {
            map.insert(id, dependents);
        }
        map
    }
}

impl Runtime {
    /// Inverse dependencies derived from the registered dependency maps.
    ///
    /// Dependency maps list every unit a factory *may* load, so this is an
    /// over-approximation of what the bundler would report.
    pub fn inverse_dependencies(&self) -> InverseDependencyMap {
        let registry = self.registry.borrow();
        let mut inverse = InverseDependencyMap::new();
        let mut ids: Vec<_> = registry.ids().collect();
        ids.sort();
        for id in ids {
            let Some(unit) = registry.get(id) else {
                continue;
            };
            for dependency in unit.dependency_map() {
                inverse.add_edge(dependency, id);
            }
        }
        inverse
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Why an update could not be applied in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FullReloadReason {
    #[error("dependency cycle: {}", format_chain(.chain))]
    DependencyCycle { chain: Vec<UnitId> },

    #[error("no root boundary: updating {unit} reaches {root}")]
    NoRootBoundary { unit: UnitId, root: UnitId },

    #[error("no longer a boundary: {unit}")]
    NoLongerBoundary { unit: UnitId },

    #[error("invalidated boundary: {unit}")]
    InvalidatedBoundary { unit: UnitId },

    #[error("hot updates are disabled")]
    Disabled,

    #[error("update of {unit} while units are evaluating")]
    UpdateDuringEvaluation { unit: UnitId },
}

fn format_chain(chain: &[UnitId]) -> String {
    join_ids(chain, " -> ")
}

fn format_list(ids: &[UnitId]) -> String {
    join_ids(ids, ", ")
}

fn join_ids(ids: &[UnitId], sep: &str) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Result of [`Runtime::accept_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Unknown id: defined as a new unit, nothing ran.
    Registered,
    /// Never evaluated: the factory was swapped in, nothing ran.
    Replaced,
    /// Applied in place.
    Targeted { executed: Vec<UnitId> },
    /// Rejected, or bubbled to a root during commit.
    FullReload {
        reason: FullReloadReason,
        executed: Vec<UnitId>,
    },
    /// Some re-run failed; its error was reported and its dependents were
    /// left on its last good exports.
    Contained {
        failed: Vec<UnitId>,
        executed: Vec<UnitId>,
    },
}

impl UpdateOutcome {
    #[inline]
    pub fn is_full_reload(&self) -> bool {
        matches!(self, Self::FullReload { .. })
    }

    #[inline]
    pub fn is_targeted(&self) -> bool {
        matches!(self, Self::Targeted { .. })
    }

    /// Units whose factories ran, in execution order.
    pub fn executed(&self) -> &[UnitId] {
        match self {
            Self::Targeted { executed }
            | Self::FullReload { executed, .. }
            | Self::Contained { executed, .. } => executed,
            Self::Registered | Self::Replaced => &[],
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => f.write_str("registered"),
            Self::Replaced => f.write_str("replaced"),
            Self::Targeted { executed } => write!(f, "updated {}", format_list(executed)),
            Self::FullReload { reason, .. } => write!(f, "full reload ({reason})"),
            Self::Contained { failed, .. } => write!(f, "failed {}", format_list(failed)),
        }
    }
}

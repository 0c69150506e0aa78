//! Unit registry.
//!
//! Pure bookkeeping: the table of registered units keyed by id. Evaluation
//! lives in the loader; the registry never runs a factory and never fails.
//!
//! # Invariants
//! - An id resolves to exactly one record; redefinition keeps the record
//! - Exports of an evaluated unit are left alone by redefinition

use rustc_hash::FxHashMap;

use crate::unit::{UnitDef, UnitId, UnitRecord, UnitState};

/// What `define` did with the definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineOutcome {
    /// First registration of this id.
    Created,
    /// Existing record received a new factory.
    Redefined,
}

/// Table of unit records.
#[derive(Debug, Default)]
pub struct Registry {
    units: FxHashMap<UnitId, UnitRecord>,
}

impl Registry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition without evaluating it.
    ///
    /// An errored unit gets a fresh instance so the new version may run;
    /// an evaluated unit keeps its exports until a hot update re-runs it.
    pub fn define(&mut self, def: UnitDef) -> DefineOutcome {
        match self.units.get_mut(&def.id) {
            Some(unit) => {
                unit.redefine(def);
                if unit.state == UnitState::Errored {
                    unit.reset_instance();
                }
                DefineOutcome::Redefined
            }
            None => {
                self.units.insert(def.id.clone(), UnitRecord::new(def));
                DefineOutcome::Created
            }
        }
    }

    #[inline]
    pub fn get(&self, id: &UnitId) -> Option<&UnitRecord> {
        self.units.get(id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: &UnitId) -> Option<&mut UnitRecord> {
        self.units.get_mut(id)
    }

    #[inline]
    pub fn contains(&self, id: &UnitId) -> bool {
        self.units.contains_key(id)
    }

    /// Display name for diagnostics: label, id, or `[unknown]`.
    pub fn display_name(&self, id: &UnitId) -> String {
        self.units
            .get(id)
            .map_or_else(|| "[unknown]".to_string(), UnitRecord::display_name)
    }

    /// Registered ids in unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = &UnitId> {
        self.units.keys()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drop every record.
    #[inline]
    pub fn reset(&mut self) {
        self.units.clear();
    }
}

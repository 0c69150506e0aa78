//! Update commit: re-running units in order and deciding propagation.

use rustc_hash::FxHashSet;

use super::plan::plan_update;
use super::{FullReloadReason, InverseDependencyMap, Signature, UpdateOutcome};
use crate::error::{LoadError, SharedError};
use crate::runtime::Runtime;
use crate::unit::{Acceptance, UnitDef, UnitId, UnitState, Value};

/// What a unit looked like before a re-run, restored if the re-run fails.
struct Snapshot {
    exports: Value,
    state: UnitState,
    stored_error: Option<SharedError>,
    imported_default: Option<Value>,
    imported_all: Option<Value>,
    acceptance: Acceptance,
}

/// Boundary status of a unit before and after its re-run.
struct Rerun {
    /// The previous instance was a boundary of either kind.
    was_boundary: bool,
    prev_signature: Option<Signature>,
    next_signature: Option<Signature>,
    self_accepted: bool,
}

impl Runtime {
    /// Apply a new definition of a unit to the running graph.
    ///
    /// Never fails: factory errors are reported to the listener and
    /// contained, and anything unsafe becomes a full reload.
    pub fn accept_update(&self, def: UnitDef, inverse: &InverseDependencyMap) -> UpdateOutcome {
        let id = def.id.clone();

        if !self.settings.hot_enabled {
            return self.full_reload(FullReloadReason::Disabled, Vec::new());
        }
        if !self.loading.borrow().is_empty() {
            let reason = FullReloadReason::UpdateDuringEvaluation { unit: id };
            return self.full_reload(reason, Vec::new());
        }

        let state = self.registry.borrow().get(&id).map(|unit| unit.state);
        match state {
            None => {
                self.define(def);
                return UpdateOutcome::Registered;
            }
            Some(UnitState::Unevaluated) => {
                self.define(def);
                return UpdateOutcome::Replaced;
            }
            Some(UnitState::Evaluating) => {
                let reason = FullReloadReason::UpdateDuringEvaluation { unit: id };
                return self.full_reload(reason, Vec::new());
            }
            Some(UnitState::Evaluated | UnitState::Errored) => {}
        }

        let plan = {
            let registry = self.registry.borrow();
            plan_update(&id, inverse, |unit| match registry.get(unit) {
                Some(record) if is_live(record.state) => record.acceptance.is_terminator(),
                // Nothing live to refresh past this unit
                _ => true,
            })
        };
        let order = match plan {
            Ok(order) => order,
            Err(error) => {
                crate::debug!("hot"; "rejected update of {}: {}", id, error);
                return self.full_reload(error.into(), Vec::new());
            }
        };

        self.commit(def, &order, inverse)
    }

    fn commit(
        &self,
        def: UnitDef,
        order: &[UnitId],
        inverse: &InverseDependencyMap,
    ) -> UpdateOutcome {
        let edited = def.id.clone();
        let mut def = Some(def);
        let mut propagated: FxHashSet<UnitId> = FxHashSet::default();
        // Dependents of a failed re-run keep their current instance
        let mut blocked: FxHashSet<UnitId> = FxHashSet::default();
        let mut executed = Vec::new();
        let mut failed = Vec::new();

        for unit in order {
            if blocked.contains(unit) {
                continue;
            }
            let reached = *unit == edited
                || propagated
                    .iter()
                    .any(|from| inverse.dependents(from).contains(unit));
            if !reached {
                continue;
            }
            let live = self
                .registry
                .borrow()
                .get(unit)
                .is_some_and(|record| is_live(record.state));
            if !live {
                continue;
            }

            let new_def = if *unit == edited { def.take() } else { None };
            let rerun = match self.rerun(unit, new_def) {
                Ok(rerun) => rerun,
                Err(error) => {
                    self.listener.report_fatal_error(&error);
                    block_dependents(unit, inverse, &mut blocked);
                    failed.push(unit.clone());
                    continue;
                }
            };
            executed.push(unit.clone());

            let accepting = rerun.self_accepted || rerun.next_signature.is_some();
            if accepting && self.is_stable(&rerun) {
                continue;
            }

            if inverse.dependents(unit).is_empty() {
                let reason = if accepting {
                    FullReloadReason::InvalidatedBoundary { unit: unit.clone() }
                } else if rerun.was_boundary {
                    FullReloadReason::NoLongerBoundary { unit: unit.clone() }
                } else {
                    FullReloadReason::NoRootBoundary {
                        unit: edited.clone(),
                        root: unit.clone(),
                    }
                };
                return self.full_reload(reason, executed);
            }
            propagated.insert(unit.clone());
        }

        if !failed.is_empty() {
            crate::debug!("hot"; "update contained, {} unit(s) failed", failed.len());
            return UpdateOutcome::Contained { failed, executed };
        }

        crate::debug!(
            "hot";
            "re-ran {}",
            executed.iter().map(|id| self.display_name(id)).collect::<Vec<_>>().join(", ")
        );
        self.listener.on_targeted_update();
        UpdateOutcome::Targeted { executed }
    }

    /// Replace one live unit's instance by running its factory again.
    fn rerun(&self, id: &UnitId, def: Option<UnitDef>) -> Result<Rerun, LoadError> {
        let unknown = || LoadError::UnknownUnit { id: id.clone() };

        let dispose = {
            let mut registry = self.registry.borrow_mut();
            let unit = registry.get_mut(id).ok_or_else(unknown)?;
            unit.acceptance.dispose_callback.take()
        };
        if let Some(dispose) = dispose {
            if let Err(error) = dispose() {
                crate::log!(
                    "hot";
                    "dispose handler of {} failed: {:#}",
                    self.display_name(id),
                    error
                );
            }
        }

        let snapshot = {
            let mut registry = self.registry.borrow_mut();
            let unit = registry.get_mut(id).ok_or_else(unknown)?;
            match def {
                Some(def) => unit.redefine(def),
                None => unit.version += 1,
            }
            let snapshot = Snapshot {
                exports: unit.exports.clone(),
                state: unit.state,
                stored_error: unit.stored_error.clone(),
                imported_default: unit.imported_default.clone(),
                imported_all: unit.imported_all.clone(),
                acceptance: std::mem::take(&mut unit.acceptance),
            };
            unit.reset_instance();
            snapshot
        };

        if let Err(error) = self.load_unit(id) {
            self.restore(id, snapshot);
            return Err(error);
        }

        let (accept, self_accepted, next_signature) = {
            let registry = self.registry.borrow();
            let unit = registry.get(id).ok_or_else(unknown)?;
            (
                unit.acceptance.accept_callback.clone(),
                unit.acceptance.self_accepted,
                unit.acceptance.boundary_signature.clone(),
            )
        };
        if let Some(accept) = accept {
            if let Err(error) = accept() {
                crate::log!(
                    "hot";
                    "accept handler of {} failed: {:#}",
                    self.display_name(id),
                    error
                );
            }
        }

        Ok(Rerun {
            was_boundary: snapshot.acceptance.is_terminator(),
            prev_signature: snapshot.acceptance.boundary_signature,
            next_signature,
            self_accepted,
        })
    }

    /// Put back the last good instance after a failed re-run.
    ///
    /// The new factory stays installed and the dispose handler stays spent.
    /// A unit that had never evaluated successfully keeps the new error.
    fn restore(&self, id: &UnitId, snapshot: Snapshot) {
        let mut registry = self.registry.borrow_mut();
        let Some(unit) = registry.get_mut(id) else {
            return;
        };
        unit.acceptance = Acceptance {
            dispose_callback: None,
            ..snapshot.acceptance
        };
        if snapshot.state == UnitState::Evaluated {
            unit.exports = snapshot.exports;
            unit.state = snapshot.state;
            unit.stored_error = snapshot.stored_error;
            unit.imported_default = snapshot.imported_default;
            unit.imported_all = snapshot.imported_all;
        }
    }

    fn is_stable(&self, rerun: &Rerun) -> bool {
        match (&rerun.prev_signature, &rerun.next_signature) {
            (None, None) => true,
            (Some(prev), Some(next)) => match &self.classifier {
                Some(classifier) => classifier.same_shape(prev, next),
                None => prev == next,
            },
            _ => false,
        }
    }

    fn full_reload(&self, reason: FullReloadReason, executed: Vec<UnitId>) -> UpdateOutcome {
        self.listener.on_full_reload(&reason);
        UpdateOutcome::FullReload { reason, executed }
    }
}

#[inline]
fn is_live(state: UnitState) -> bool {
    matches!(state, UnitState::Evaluated | UnitState::Errored)
}

/// Collect every unit above `failed` in the inverse map.
fn block_dependents(
    failed: &UnitId,
    inverse: &InverseDependencyMap,
    blocked: &mut FxHashSet<UnitId>,
) {
    let mut stack = vec![failed.clone()];
    while let Some(unit) = stack.pop() {
        for dependent in inverse.dependents(&unit) {
            if blocked.insert(dependent.clone()) {
                stack.push(dependent.clone());
            }
        }
    }
}

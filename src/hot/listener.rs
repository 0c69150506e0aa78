//! Update events and the fatal-error sink.

use std::rc::Rc;

use super::FullReloadReason;
use crate::error::LoadError;
use crate::loader::RequireCycle;

/// Collaborator notified about update outcomes, failures and cycles.
///
/// Every method logs by default, so an embedder only overrides what it
/// wants to route elsewhere.
pub trait HotListener {
    /// An update was applied in place; a partial refresh is safe.
    fn on_targeted_update(&self) {
        crate::log!("hot"; "update applied");
    }

    /// The update cannot be applied in place.
    fn on_full_reload(&self, reason: &FullReloadReason) {
        crate::log!("reload"; "full reload required: {}", reason);
    }

    /// A factory failed where nobody can receive the error.
    fn report_fatal_error(&self, error: &LoadError) {
        match error {
            LoadError::Factory { unit, error } => {
                crate::log!("error"; "unit {} failed: {:#}", unit, error.inner())
            }
            other => crate::log!("error"; "{}", other),
        }
    }

    /// A load re-entered a unit that is still evaluating.
    fn on_require_cycle(&self, cycle: &RequireCycle) {
        crate::log!(
            "cycle";
            "Require cycle: {}\n\nRequire cycles are allowed, but can result in \
             uninitialized values. Consider refactoring to remove the need for a cycle.",
            cycle
        );
    }
}

/// Logs every event through the crate logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl HotListener for LogListener {}

impl<T: HotListener + ?Sized> HotListener for Rc<T> {
    fn on_targeted_update(&self) {
        (**self).on_targeted_update();
    }

    fn on_full_reload(&self, reason: &FullReloadReason) {
        (**self).on_full_reload(reason);
    }

    fn report_fatal_error(&self, error: &LoadError) {
        (**self).report_fatal_error(error);
    }

    fn on_require_cycle(&self, cycle: &RequireCycle) {
        (**self).on_require_cycle(cycle);
    }
}

//! Require-cycle detection.
//!
//! A cycle is found when a load targets a unit that is still on the loading
//! stack. The chain runs from that unit to the top of the stack; it is
//! reported once per runtime unless a unit name along it is ignored.

use std::fmt;

use crate::runtime::Runtime;
use crate::unit::UnitId;

/// A require cycle, from the re-entered unit to the unit that re-entered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireCycle {
    pub units: Vec<UnitId>,
    /// Display names, parallel to `units`.
    pub names: Vec<String>,
}

impl fmt::Display for RequireCycle {
    /// `a -> b -> c -> a`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.names {
            write!(f, "{name} -> ")?;
        }
        match self.names.first() {
            Some(first) => f.write_str(first),
            None => Ok(()),
        }
    }
}

impl Runtime {
    pub(super) fn report_cycle(&self, id: &UnitId) {
        if !self.settings.warn_cycles {
            return;
        }

        let units = {
            let loading = self.loading.borrow();
            let Some(start) = loading.iter().position(|unit| unit == id) else {
                return;
            };
            loading[start..].to_vec()
        };

        if !self.reported_cycles.borrow_mut().insert(units.clone()) {
            return;
        }

        let names: Vec<String> = units.iter().map(|unit| self.display_name(unit)).collect();
        if self.settings.is_cycle_ignored(&names) {
            crate::debug!("cycle"; "ignored require cycle through {}", names.join(", "));
            return;
        }

        self.listener.on_require_cycle(&RequireCycle { units, names });
    }
}

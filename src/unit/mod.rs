//! Unit data model.
//!
//! - `id` - Unit identifiers (numeric or named)
//! - `value` - Dynamically-typed export values
//! - `record` - Per-unit registry records and definitions

mod id;
mod record;
mod value;

pub use id::UnitId;
pub use record::{Acceptance, DependencyMap, Factory, HotCallback, UnitDef, UnitRecord, UnitState};
pub use value::{Native, Object, Value};

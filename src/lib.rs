//! hotmod - A dependency-aware unit loader with transactional hot updates.
//!
//! Units are lazily-evaluated factories keyed by id. A [`Runtime`] loads
//! them on demand, tolerates require cycles, memoizes exports and errors,
//! defines whole segments lazily, and applies edits by re-running the
//! smallest safe set of units (or asking for a full reload).
//!
//! ```ignore
//! let runtime = Runtime::new();
//! runtime.define(UnitDef::new("b", |ctx| {
//!     ctx.accept();
//!     ctx.export("value", 1);
//!     Ok(())
//! }));
//! runtime.define(
//!     UnitDef::new("a", |ctx| {
//!         let b = ctx.require(0)?;
//!         ctx.export("b", b.get("value"));
//!         Ok(())
//!     })
//!     .deps(["b"]),
//! );
//! runtime.load("a")?;
//!
//! let inverse = runtime.inverse_dependencies();
//! let next = UnitDef::new("b", |ctx| {
//!     ctx.accept();
//!     Ok(())
//! });
//! let outcome = runtime.accept_update(next, &inverse);
//! assert!(outcome.is_targeted());
//! ```

pub mod logger;

pub mod config;
pub mod error;
pub mod hot;
pub mod loader;
pub mod registry;
pub mod runtime;
pub mod segment;
pub mod unit;

pub use config::RuntimeConfig;
pub use error::{LoadError, SegmentError, SharedError};
pub use hot::{
    BoundaryClassifier, FullReloadReason, HotListener, InverseDependencyMap, LogListener, Signature,
    UpdateOutcome,
};
pub use loader::{RequireCycle, UnitContext};
pub use runtime::{Runtime, RuntimeBuilder};
pub use segment::{pack, unpack};
pub use unit::{Native, Object, UnitDef, UnitId, UnitState, Value};

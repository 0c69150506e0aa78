//! Configuration sections.

mod cycles;
mod hot;

pub use cycles::{CycleConfig, NODE_MODULES_PATTERN};
pub use hot::HotConfig;

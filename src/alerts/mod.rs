/// Edge-triggered alert flags and the per-cycle evaluator
pub mod evaluator;
pub mod state;

pub use evaluator::{evaluate, reboot_message, stale_message, CycleReport};
pub use state::AlertState;

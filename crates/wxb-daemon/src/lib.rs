//! wxbridge daemon
//!
//! Live bridge from the station provider's stream to the local store and
//! the aggregator, plus the backfill and merge batch commands.

pub mod bridge;
pub mod commands;
pub mod scheduler;

pub use bridge::{run_bridge, BridgeOptions};
pub use scheduler::{Scheduler, SchedulerStats};

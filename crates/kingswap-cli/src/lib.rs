//! KingSwap economics CLI
//!
//! Scenario runner and calculators over `kingswap-economics`. The binary in
//! `main.rs` is a thin clap front end to these modules.

pub mod scenario;
pub mod tools;

pub use scenario::{Account, Outcome, Report, Scenario, Step, StepReport};
pub use tools::{describe_presets, early_exit, parse_amount, EarlyExitReport, MultiplierReport};

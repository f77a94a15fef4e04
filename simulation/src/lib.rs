//! # GeoDTN Simulation
//!
//! Runs geocast delay-tolerant network scenarios on top of `geodtn-routing`.
//!
//! The routing core only needs host locations, the set of live links and a
//! tick. This crate supplies them:
//!
//! - **Scenario** (`scenario.rs`): JSON scenario files with hosts, regions,
//!   cells, a scripted mobility feed and scheduled messages, plus a seeded
//!   random-walk generator
//! - **Runner** (`runner.rs`): the tick loop that replays the script and
//!   updates every host
//! - **Stats** (`stats.rs`): a listener that turns message events into
//!   delivery, latency and overhead figures
//!
//! ## Example
//!
//! ```rust,ignore
//! use geodtn_simulation::{Runner, ScenarioConfig};
//!
//! let config = ScenarioConfig::load("scenarios/plaza.json")?;
//! let report = Runner::new(&config)?.run()?;
//! println!("{report}");
//! ```

pub mod runner;
pub mod scenario;
pub mod stats;

pub use runner::{Report, Runner};
pub use scenario::{
    CellSpec, HostSpec, MessageSpec, RandomScenario, RegionSpec, ScenarioConfig, ScenarioError,
    ScriptEvent, Target,
};
pub use stats::SimStats;

//! Episode statistics of training and evaluation runs.
//!
//! [`Monitor`] wraps an environment and tracks the lifecycle of its episodes.
//! The statistics themselves are kept by a [`StatsRecorder`], separately for
//! [`MonitorMode::Train`] and [`MonitorMode::Eval`].
//!
//! ```
//! use rltf_core::{dummy::{DummyAct, DummyEnv}, monitor::{Monitor, MonitorMode}, Env};
//! # fn main() -> anyhow::Result<()> {
//! let dir = std::env::temp_dir().join("rltf_monitor_doctest");
//! let env = DummyEnv::build(&3, 0)?;
//! let mut monitor = Monitor::new(env, &dir, MonitorMode::Train)?;
//!
//! monitor.reset(None)?;
//! for _ in 0..3 {
//!     monitor.step(&DummyAct(0.0))?;
//! }
//! assert_eq!(monitor.episode_rewards(MonitorMode::Train), &[3.0]);
//! monitor.close()?;
//! # Ok(())
//! # }
//! ```
mod base;
mod config;
mod evaluator;
mod mode;
mod stats_recorder;
pub use base::Monitor;
pub use config::MonitorConfig;
pub use evaluator::MonitoredEvaluator;
pub use mode::MonitorMode;
pub use stats_recorder::{EpisodeStats, LogInfo, StatsRecorder};

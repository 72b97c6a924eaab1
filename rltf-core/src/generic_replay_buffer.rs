//! Generic replay buffer.
//!
//! [`SimpleReplayBuffer`] stores transitions of arbitrary observation and action
//! types implementing [`BatchBase`] in a ring buffer. Batches are sampled uniformly,
//! or with prioritized experience replay (PER) when [`PerConfig`] is given.
//!
//! ```rust,ignore
//! let config = SimpleReplayBufferConfig::default()
//!     .capacity(10000)
//!     .seed(42)
//!     .per_config(Some(PerConfig::default().alpha(0.6).beta_0(0.4)));
//! let mut buffer = SimpleReplayBuffer::<TensorBatch, TensorBatch>::build(&config);
//! ```
mod base;
mod batch;
mod config;
mod step_proc;
pub use base::{IwScheduler, SimpleReplayBuffer, WeightNormalizer};
pub use batch::{BatchBase, GenericTransitionBatch};
pub use config::{PerConfig, SimpleReplayBufferConfig};
pub use step_proc::{SimpleStepProcessor, SimpleStepProcessorConfig};

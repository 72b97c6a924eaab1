//! Reinforcement learning models and episode monitoring in Rust.
//!
//! rltf consists of the following crates:
//!
//! * [`rltf_core`] provides the traits shared by environments and agents,
//!   replay buffers, the training loop and the episode monitor which records
//!   statistics of training and evaluation episodes.
//! * [`rltf_candle_agent`] includes the model catalogue implemented with
//!   [candle](https://crates.io/crates/candle-core): DQN and its distributional
//!   and bootstrapped variants, Bayesian DQN, DDPG and QR-DDPG.
//! * [`rltf_classic_env`] has native CartPole and Pendulum environments.
//! * [`rltf_tensorboard`] writes training records which can be shown in Tensorboard.
//!
//! The [`run`] module trains any registered model on a classic environment.
//! It backs the `rltf` binary.
pub mod run;
pub use rltf_candle_agent;
pub use rltf_classic_env;
pub use rltf_core;
pub use rltf_tensorboard;

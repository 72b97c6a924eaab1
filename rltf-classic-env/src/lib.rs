//! Classic control environments for rltf.
//!
//! [`CartPole`] has two discrete actions, [`Pendulum`] takes a continuous
//! torque. Both are implemented natively and are not vectorized.
//!
//! Observations and actions wrap [`candle_core::Tensor`]s, so agents of
//! `rltf-candle-agent` can convert them without fallible copies, and they
//! can be stored in a replay buffer of [`rltf_candle_agent::TensorBatch`]es.
mod cartpole;
mod pendulum;
mod tensor;
pub use cartpole::{CartPole, CartPoleConfig};
pub use pendulum::{Pendulum, PendulumConfig};
pub use tensor::{ClassicAct, ClassicObs};

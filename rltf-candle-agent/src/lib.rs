//! RL models of rltf implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The catalogue covers value-based agents ([`dqn`], [`c51`], [`qrdqn`]),
//! bootstrapped ensembles ([`bstrap_dqn`], [`bstrap_qrdqn`]), Bayesian DQN
//! ([`bdqn`] on top of [`blr`]) and actor-critic agents ([`ddpg`], [`qrddpg`]).
//! [`registry::ModelKind`] lists all of them by name.
pub mod bdqn;
pub mod blr;
pub mod bstrap_dqn;
pub mod bstrap_qrdqn;
pub mod c51;
pub mod ddpg;
pub mod dqn;
pub mod ids;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod qrddpg;
pub mod qrdqn;
pub mod registry;
mod tensor_batch;
pub mod util;
pub mod value;
use anyhow::Result;
use candle_core::Tensor;
use rltf_core::generic_replay_buffer::GenericTransitionBatch;
use serde::{Deserialize, Serialize};
pub use tensor_batch::TensorBatch;

/// Transitions of which observations and actions are [`TensorBatch`]es.
pub type TensorTransitionBatch = GenericTransitionBatch<TensorBatch, TensorBatch>;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl Device {
    /// Creates the candle device.
    pub fn build(&self) -> Result<candle_core::Device> {
        Ok(match self {
            Self::Cpu => candle_core::Device::Cpu,
            Self::Cuda(n) => candle_core::Device::new_cuda(*n)?,
        })
    }
}

/// Activation functions applied to the output of a network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum Activation {
    /// Identity.
    None,

    /// ReLU.
    ReLU,

    /// Hyperbolic tangent.
    Tanh,

    /// Sigmoid.
    Sigmoid,
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(match self {
            Self::None => xs.clone(),
            Self::ReLU => xs.relu()?,
            Self::Tanh => xs.tanh()?,
            Self::Sigmoid => candle_nn::ops::sigmoid(xs)?,
        })
    }
}

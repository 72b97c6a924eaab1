//! Deep deterministic policy gradient.
//!
//! The actor outputs actions in `[-1, 1]` (e.g. an [`Mlp`](crate::mlp::Mlp)
//! with [`Activation::Tanh`](crate::Activation::Tanh) output), which
//! environments scale to their action ranges.
mod actor;
mod base;
mod config;
mod critic;
mod noise;
pub use actor::{Actor, ActorConfig};
pub use base::Ddpg;
pub use config::DdpgConfig;
pub use critic::{Critic, CriticConfig};
pub use noise::{ActionNoise, ActionNoiseConfig};

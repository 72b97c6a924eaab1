//! Bootstrapped DQN.
//!
//! `n_heads` heads share the torso of the network, which outputs a tensor of
//! the shape `[batch_size, n_heads * n_actions]`. Each head is trained with its
//! own double DQN target on the transitions selected by its bootstrap mask.
//!
//! Heads are combined for action selection by [`BstrapPolicy`]:
//! the active head (resampled at the start of each episode), majority vote,
//! upper confidence bound, or information-directed sampling.
mod base;
mod config;
mod mask;
mod policy;
pub use base::BstrapDqn;
pub(crate) use base::{bootstrap_loss, head_values};
pub use config::BstrapDqnConfig;
pub(crate) use mask::BootstrapMask;
pub use policy::{majority_vote, BstrapPolicy};

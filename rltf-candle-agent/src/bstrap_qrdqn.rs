//! Bootstrapped DQN with a quantile head.
//!
//! The bootstrap heads model the epistemic uncertainty of action values and the
//! quantile head models the distribution of the return. The network outputs
//! a tensor of the shape `[batch_size, n_heads * n_actions + n_actions * n_quantiles]`.
mod base;
mod config;
pub use base::{normalized_return_variance, BstrapQrDqn};
pub use config::{BstrapQrDqnConfig, BstrapQrDqnPolicy};

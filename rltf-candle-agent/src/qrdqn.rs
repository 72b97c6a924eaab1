//! Quantile regression DQN.
//!
//! The network outputs `n_quantiles` quantiles of the return for every action,
//! giving a tensor of the shape `[batch_size, n_actions * n_quantiles]`.
//! Quantiles are trained with the quantile Huber loss at the midpoints
//! `(2i + 1) / 2N`.
mod base;
mod config;
pub use base::QrDqn;
pub use config::{QrDqnConfig, QrDqnPolicy};

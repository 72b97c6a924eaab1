//! Bayesian DQN.
//!
//! The network outputs features of observations. Action values are linear in
//! the features, with one [`Blr`](crate::blr::Blr) per action whose posterior
//! is refit periodically on features of transitions in the replay buffer. The
//! network is trained with targets given by the posterior means.
mod base;
mod config;
pub use base::Bdqn;
pub use config::{BdqnConfig, BdqnPolicy};

//! DDPG with a quantile critic.
//!
//! The critic outputs `n_quantiles` quantiles of the return of an action, trained
//! with the quantile Huber loss. The actor maximizes the mean of the quantiles.
mod base;
mod config;
pub use base::QrDdpg;
pub use config::QrDdpgConfig;

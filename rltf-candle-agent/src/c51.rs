//! C51 agent, a categorical distributional DQN.
//!
//! The network outputs logits of `n_atoms` atoms for every action, giving
//! a tensor of the shape `[batch_size, n_actions * n_atoms]`. Atoms are evenly
//! spaced in `[v_min, v_max]`.
mod base;
mod config;
mod projection;
pub use base::C51;
pub use config::C51Config;
pub use projection::categorical_projection;

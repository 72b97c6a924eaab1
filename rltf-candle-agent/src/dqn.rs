//! DQN agent, with the double DQN target as an option.
mod base;
mod config;
mod explorer;
pub use base::Dqn;
pub use config::DqnConfig;
pub use explorer::{DqnExplorer, EpsilonGreedy, Softmax};
pub(crate) use explorer::random_actions;

//! Agent.
use super::{Env, Policy, ReplayBufferBase};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy on an environment.
pub trait Agent<E: Env, R: ReplayBufferBase>: Policy<E> {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step.
    ///
    /// `buffer` is a replay buffer from which transitions will be taken
    /// for updating model parameters.
    fn opt(&mut self, buffer: &mut R) -> Result<()> {
        let _ = self.opt_with_record(buffer)?;
        Ok(())
    }

    /// Performs an optimization step and returns some information.
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Record>;

    /// Save the parameters of the agent in the given directory.
    ///
    /// This method commonly creates a number of files in the directory.
    /// For example, DQN saves the online and the target Q-networks.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}

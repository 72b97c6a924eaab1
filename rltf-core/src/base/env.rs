//! Environment.
use super::{Act, Info, Obs, Step};
use crate::record::Record;
use anyhow::Result;

/// Represents an environment, typically an MDP.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Performs an environment step.
    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)>
    where
        Self: Sized;

    /// Resets the environment if `is_done[0] == 1` or `is_done.is_none()`.
    fn reset(&mut self, is_done: Option<&Vec<i8>>) -> Result<Self::Obs>;

    /// Performs an environment step and resets the environment if the episode ends.
    ///
    /// When the episode ends, the initial observation of the next episode is
    /// stored in [`Step::init_obs`].
    fn step_with_reset(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)>
    where
        Self: Sized,
    {
        let (mut step, record) = self.step(a)?;
        if step.is_done() {
            step.init_obs = Some(self.reset(None)?);
        }
        Ok((step, record))
    }

    /// Resets the environment with a given index.
    ///
    /// The index is used in an arbitrary way, typically as a random seed
    /// for reproducible evaluation runs.
    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs>;
}

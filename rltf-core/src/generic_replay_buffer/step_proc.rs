//! Conversion of environment steps into transitions.
use super::{BatchBase, GenericTransitionBatch};
use crate::{Env, Obs, Step, StepProcessor};
use anyhow::{bail, Context, Result};
use std::{default::Default, marker::PhantomData};

/// Configuration of [`SimpleStepProcessor`].
#[derive(Clone, Debug, Default)]
pub struct SimpleStepProcessorConfig {}

/// Produces 1-step transitions from [`Step`]s of a non-vectorized environment.
///
/// The processor keeps the previous observation, which becomes `o_t` of the
/// next transition. At the end of an episode it is replaced with
/// [`Step::init_obs`].
pub struct SimpleStepProcessor<E, O, A> {
    prev_obs: Option<O>,
    phantom: PhantomData<(E, A)>,
}

impl<E, O, A> StepProcessor<E> for SimpleStepProcessor<E, O, A>
where
    E: Env,
    O: BatchBase + From<E::Obs>,
    A: BatchBase + From<E::Act>,
{
    type Config = SimpleStepProcessorConfig;
    type Output = GenericTransitionBatch<O, A>;

    fn build(_config: &Self::Config) -> Self {
        Self {
            prev_obs: None,
            phantom: PhantomData,
        }
    }

    fn reset(&mut self, init_obs: E::Obs) {
        self.prev_obs = Some(init_obs.into());
    }

    fn process(&mut self, step: Step<E>) -> Result<Self::Output> {
        if step.obs.len() != 1 {
            bail!("Vectorized environments are not supported");
        }

        let is_done = step.is_done();
        let next_obs = step.obs.clone().into();
        let obs = self
            .prev_obs
            .replace(step.obs.into())
            .context("prev_obs is not set. Forgot to call reset()?")?;

        if is_done {
            let init_obs = step
                .init_obs
                .context("init_obs must be set at the end of an episode")?;
            self.prev_obs.replace(init_obs.into());
        }

        Ok(GenericTransitionBatch {
            obs,
            act: step.act.into(),
            next_obs,
            reward: step.reward,
            is_terminated: step.is_terminated,
            is_truncated: step.is_truncated,
            ix_sample: None,
            weight: None,
        })
    }
}

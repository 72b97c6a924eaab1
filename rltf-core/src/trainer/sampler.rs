//! Experience sampling for the training loop.
use crate::{record::Record, Env, ExperienceBufferBase, Policy, StepProcessor};
use anyhow::{Context, Result};
use std::time::{Duration, SystemTime};

/// Runs environment steps with a policy and pushes the resulting transitions
/// into a replay buffer.
///
/// At the start of every episode, including the first one, the sampler calls
/// [`Policy::reset`] and resets the step processor with the initial observation.
pub struct Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    env: E,
    prev_obs: Option<E::Obs>,
    step_processor: P,
    n_env_steps_for_fps: usize,
    time: Duration,
}

impl<E, P> Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    /// Constructs a sampler.
    pub fn new(env: E, step_processor: P) -> Self {
        Self {
            env,
            prev_obs: None,
            step_processor,
            n_env_steps_for_fps: 0,
            time: Duration::default(),
        }
    }

    /// Returns a reference to the environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Returns a mutable reference to the environment.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Samples a transition and pushes it into the replay buffer.
    ///
    /// The returned record is the one given by the environment.
    pub fn sample_and_push<Q, R>(&mut self, policy: &mut Q, buffer: &mut R) -> Result<Record>
    where
        Q: Policy<E>,
        R: ExperienceBufferBase<Item = P::Output>,
    {
        let timer = SystemTime::now();

        if self.prev_obs.is_none() {
            let init_obs = self.env.reset(None)?;
            self.step_processor.reset(init_obs.clone());
            self.prev_obs = Some(init_obs);
            policy.reset();
        }

        let obs = self.prev_obs.take().context("Observation is not set")?;
        let act = policy.sample(&obs)?;
        let (step, record) = self.env.step_with_reset(&act)?;
        let is_done = step.is_done();

        let next_obs = match is_done {
            true => step
                .init_obs
                .clone()
                .context("init_obs must be set at the end of an episode")?,
            false => step.obs.clone(),
        };

        let transition = self.step_processor.process(step)?;
        buffer.push(transition)?;

        if is_done {
            self.step_processor.reset(next_obs.clone());
            policy.reset();
        }
        self.prev_obs = Some(next_obs);

        self.time += timer.elapsed()?;
        self.n_env_steps_for_fps += 1;

        Ok(record)
    }

    /// Returns frames (environment steps) per second, then resets the internal counter.
    pub fn fps(&mut self) -> f32 {
        let fps = match self.time.as_secs_f32() {
            t if t > 0.0 => self.n_env_steps_for_fps as f32 / t,
            _ => 0.0,
        };
        self.reset_fps_counter();
        fps
    }

    /// Resets the counter of environment steps for computing fps.
    pub fn reset_fps_counter(&mut self) {
        self.n_env_steps_for_fps = 0;
        self.time = Duration::default();
    }
}

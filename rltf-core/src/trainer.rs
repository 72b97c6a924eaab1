//! Train [`Agent`].
mod config;
mod sampler;
use crate::{
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    Agent, Env, Evaluator, ExperienceBufferBase, ReplayBufferBase, StepProcessor,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{info, warn};
pub use sampler::Sampler;
use std::{
    marker::PhantomData,
    path::Path,
    time::{Duration, SystemTime},
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages training loop and related objects.
///
/// # Training loop
///
/// 1. Reset counters of environment steps `env_steps` and optimization steps `opt_steps`.
/// 2. Do an environment step with [`Sampler`] and push a transition to the replay buffer.
/// 3. `env_steps += 1`
/// 4. If `env_steps >= warmup_period` and `env_steps % opt_interval == 0`:
///     1. Do an optimization step for the agent with batches sampled from the replay buffer.
///        The record of the agent is taken every `record_agent_info_interval` steps.
///     2. `opt_steps += 1`
///     3. If `opt_steps % record_compute_cost_interval == 0`, add `"fps"` and
///        `"opt_steps_per_sec"` to the record.
///     4. If `opt_steps % eval_interval == 0`, evaluate the agent and add the result
///        to the record. When the evaluation reward is the best so far, the parameters
///        are saved in `(model_dir)/best`.
///     5. If `opt_steps % save_interval == 0`, the parameters are saved in
///        `(model_dir)/(opt_steps)`.
/// 5. Store the record in the recorder and flush it every `flush_record_interval`
///    optimization steps.
/// 6. Finish if `opt_steps == max_opts`, otherwise go back to 2.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|Env::Act|B[Env]
///     B -->|Env::Obs|A
///     B -->|"Step&lt;E: Env&gt;"|C[StepProcessor]
///     C -->|ReplayBufferBase::Item|D[ReplayBufferBase]
///     D -->|TransitionBatch|A
/// ```
pub struct Trainer<E, P, R>
where
    E: Env,
    P: StepProcessor<E>,
    R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
{
    config: TrainerConfig,

    /// Optimization steps for computing optimization steps per second.
    opt_steps_for_ops: usize,

    /// Timer for computing for optimization steps per second.
    timer_for_ops: Duration,

    phantom: PhantomData<(E, P, R)>,
}

impl<E, P, R> Trainer<E, P, R>
where
    E: Env,
    P: StepProcessor<E>,
    R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
{
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self {
            config,
            opt_steps_for_ops: 0,
            timer_for_ops: Duration::new(0, 0),
            phantom: PhantomData,
        }
    }

    fn save_model<A: Agent<E, R>>(agent: &A, model_dir: &Path) {
        match agent.save_params(model_dir) {
            Ok(()) => info!("Saved the model in {:?}", model_dir),
            Err(e) => warn!("Failed to save model in {:?}: {}", model_dir, e),
        }
    }

    /// Returns optimization steps per second, then reset the internal counter.
    fn opt_steps_per_sec(&mut self) -> f32 {
        let secs = self.timer_for_ops.as_secs_f32();
        let osps = match secs > 0.0 {
            true => self.opt_steps_for_ops as f32 / secs,
            false => 0.0,
        };
        self.opt_steps_for_ops = 0;
        self.timer_for_ops = Duration::new(0, 0);
        osps
    }

    /// Performs a training step.
    ///
    /// First, it performs an environment step once and pushes a transition
    /// into the given buffer with [`Sampler`]. Then, if the number of environment steps
    /// reaches the optimization interval `opt_interval`, performs an optimization
    /// step.
    ///
    /// The second return value in the tuple is if an optimization step is done (`true`).
    pub fn train_step<A>(
        &mut self,
        agent: &mut A,
        buffer: &mut R,
        sampler: &mut Sampler<E, P>,
        env_steps: &mut usize,
        opt_steps: &mut usize,
    ) -> Result<(Record, bool)>
    where
        A: Agent<E, R>,
    {
        let mut record = sampler.sample_and_push(agent, buffer)?;
        *env_steps += 1;

        if *env_steps < self.config.warmup_period || *env_steps % self.config.opt_interval != 0 {
            return Ok((record, false));
        }

        let timer = SystemTime::now();
        if (*opt_steps + 1) % self.config.record_agent_info_interval == 0 {
            let record_agent = agent.opt_with_record(buffer)?;
            record = record.merge(record_agent);
        } else {
            agent.opt(buffer)?;
        }
        *opt_steps += 1;
        self.timer_for_ops += timer.elapsed()?;
        self.opt_steps_for_ops += 1;

        Ok((record, true))
    }

    /// Trains the agent.
    ///
    /// `env` is used for sampling transitions and `evaluator` for evaluating the agent.
    /// Returns the best evaluation reward, if evaluation was performed.
    pub fn train<A, D>(
        &mut self,
        env: E,
        step_proc: P,
        agent: &mut A,
        buffer: &mut R,
        recorder: &mut dyn AggregateRecorder,
        evaluator: &mut D,
    ) -> Result<Option<f32>>
    where
        A: Agent<E, R>,
        D: Evaluator<E>,
    {
        let mut sampler = Sampler::new(env, step_proc);
        let mut max_eval_reward: Option<f32> = None;
        let mut env_steps: usize = 0;
        let mut opt_steps: usize = 0;
        sampler.reset_fps_counter();
        agent.train();

        loop {
            let (mut record, is_opt) =
                self.train_step(agent, buffer, &mut sampler, &mut env_steps, &mut opt_steps)?;

            if is_opt {
                if opt_steps % self.config.record_compute_cost_interval == 0 {
                    record.insert("fps", Scalar(sampler.fps()));
                    record.insert("opt_steps_per_sec", Scalar(self.opt_steps_per_sec()));
                }

                if opt_steps % self.config.eval_interval == 0 {
                    info!("Starts evaluation of the trained model");
                    agent.eval();
                    let record_eval = evaluator.evaluate(agent)?;
                    agent.train();
                    let eval_reward = record_eval.get_scalar("eval_reward")?;
                    record = record.merge(record_eval);

                    if max_eval_reward.map_or(true, |r| eval_reward > r) {
                        max_eval_reward = Some(eval_reward);
                        if let Some(model_dir) = &self.config.model_dir {
                            Self::save_model(agent, &Path::new(model_dir).join("best"));
                        }
                    }
                }

                if opt_steps % self.config.save_interval == 0 {
                    if let Some(model_dir) = &self.config.model_dir {
                        let path = Path::new(model_dir).join(opt_steps.to_string());
                        Self::save_model(agent, &path);
                    }
                }
            }

            if !record.is_empty() {
                recorder.store(record);
            }

            if is_opt {
                if (opt_steps - 1) % self.config.flush_record_interval == 0 {
                    recorder.flush(opt_steps as _);
                }
                if opt_steps == self.config.max_opts {
                    break;
                }
            }
        }

        Ok(max_eval_reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAgent, DummyBatch, DummyEnv},
        generic_replay_buffer::{
            SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
            SimpleStepProcessorConfig,
        },
        record::BufferedRecorder,
        DefaultEvaluator,
    };
    use tempdir::TempDir;

    type StepProc = SimpleStepProcessor<DummyEnv, DummyBatch, DummyBatch>;
    type ReplayBuffer = SimpleReplayBuffer<DummyBatch, DummyBatch>;

    #[test]
    fn test_train_dummy_agent() -> Result<()> {
        let dir = TempDir::new("trainer")?;
        let model_dir = dir.path().to_str().unwrap().to_string();
        let config = TrainerConfig::default()
            .max_opts(10)
            .warmup_period(4)
            .eval_interval(5)
            .save_interval(5)
            .record_agent_info_interval(1)
            .flush_record_interval(1)
            .model_dir(model_dir);

        let env = DummyEnv::build(&5, 0)?;
        let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
        let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default());
        let mut agent = DummyAgent::default();
        let mut recorder = BufferedRecorder::new();
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&5, 0, 2)?;

        let mut trainer = Trainer::<DummyEnv, StepProc, ReplayBuffer>::build(config);
        let best = trainer.train(
            env,
            step_proc,
            &mut agent,
            &mut buffer,
            &mut recorder,
            &mut evaluator,
        )?;

        assert_eq!(agent.n_opts, 10);
        assert_eq!(buffer.len(), 13);
        assert_eq!(best, Some(5.0));
        assert!(dir.path().join("best").join("n_opts.txt").exists());
        assert!(dir.path().join("5").exists());
        assert!(dir.path().join("10").exists());

        // One flush per optimization step.
        assert_eq!(recorder.len(), 10);
        let last = recorder.iter().last().unwrap();
        assert_eq!(last.get_scalar("opt_steps")?, 10.0);
        assert_eq!(last.get_scalar("mean_reward")?, 1.0);
        assert_eq!(last.get_scalar("eval_reward")?, 5.0);

        // Episode starts: the initial one plus one after each of the two finished episodes,
        // then evaluation episodes.
        assert_eq!(agent.n_resets, 3 + 2 * 2);
        Ok(())
    }
}

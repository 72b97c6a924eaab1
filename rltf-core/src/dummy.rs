//! Minimal environment, policy and batch types used in tests.
//!
//! [`DummyEnv`] emits reward `1` at every step and terminates an episode after
//! `episode_len` steps. Observations are the step counts within the episode.
use crate::{
    generic_replay_buffer::{BatchBase, GenericTransitionBatch},
    record::{Record, RecordValue},
    Agent, Env, Policy, ReplayBufferBase, Step,
};
use anyhow::Result;
use std::path::Path;

/// Observation of [`DummyEnv`].
#[derive(Clone, Debug, PartialEq)]
pub struct DummyObs(pub f32);

impl crate::Obs for DummyObs {
    fn len(&self) -> usize {
        1
    }
}

/// Action of [`DummyEnv`].
#[derive(Clone, Debug, PartialEq)]
pub struct DummyAct(pub f32);

impl crate::Act for DummyAct {}

/// An environment with fixed-length episodes.
pub struct DummyEnv {
    episode_len: usize,
    t: usize,
    seed: i64,
}

impl Env for DummyEnv {
    type Config = usize;
    type Obs = DummyObs;
    type Act = DummyAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            episode_len: *config,
            t: 0,
            seed,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        self.t += 1;
        let is_terminated = (self.t >= self.episode_len) as i8;
        let step = Step::new(
            DummyObs(self.t as f32),
            a.clone(),
            vec![1.0],
            vec![is_terminated],
            vec![0],
            (),
            None,
        );
        Ok((step, Record::empty()))
    }

    fn reset(&mut self, _is_done: Option<&Vec<i8>>) -> Result<Self::Obs> {
        self.t = 0;
        Ok(DummyObs(0.0))
    }

    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.seed = ix as i64;
        self.reset(None)
    }
}

/// Scalars stored in a vector, for replay buffers of [`DummyEnv`] transitions.
pub struct DummyBatch(pub Vec<f32>);

impl BatchBase for DummyBatch {
    fn new(capacity: usize) -> Self {
        Self(vec![0.0; capacity])
    }

    fn push(&mut self, ix: usize, data: Self) -> Result<()> {
        let capacity = self.0.len();
        for (k, v) in data.0.into_iter().enumerate() {
            self.0[(ix + k) % capacity] = v;
        }
        Ok(())
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        Ok(Self(ixs.iter().map(|&ix| self.0[ix]).collect()))
    }
}

impl From<DummyObs> for DummyBatch {
    fn from(obs: DummyObs) -> Self {
        Self(vec![obs.0])
    }
}

impl From<DummyAct> for DummyBatch {
    fn from(act: DummyAct) -> Self {
        Self(vec![act.0])
    }
}

/// An agent taking a constant action and counting optimization steps.
#[derive(Default)]
pub struct DummyAgent {
    /// Number of optimization steps.
    pub n_opts: usize,

    /// Number of episode starts seen through [`Policy::reset`].
    pub n_resets: usize,

    train: bool,
}

impl Policy<DummyEnv> for DummyAgent {
    fn sample(&mut self, _obs: &DummyObs) -> Result<DummyAct> {
        Ok(DummyAct(0.0))
    }

    fn reset(&mut self) {
        self.n_resets += 1;
    }
}

impl<R> Agent<DummyEnv, R> for DummyAgent
where
    R: ReplayBufferBase<Batch = GenericTransitionBatch<DummyBatch, DummyBatch>>,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Record> {
        let batch = buffer.batch(4)?;
        self.n_opts += 1;
        let mean_reward = batch.reward.iter().sum::<f32>() / batch.reward.len() as f32;
        Ok(Record::from_slice(&[(
            "mean_reward",
            RecordValue::Scalar(mean_reward),
        )]))
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        std::fs::write(path.join("n_opts.txt"), self.n_opts.to_string())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.n_opts = std::fs::read_to_string(path.join("n_opts.txt"))?.parse()?;
        Ok(())
    }
}

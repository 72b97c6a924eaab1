//! Configuration of a training run.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of a training run of [`train`](super::train).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RunConfig {
    /// The number of optimization steps.
    pub max_opts: usize,

    /// Environment steps before the first optimization step.
    pub warmup_period: usize,

    /// Interval of evaluation in optimization steps. Records are flushed at
    /// the same interval.
    pub eval_interval: usize,

    /// The number of episodes per evaluation.
    pub n_episodes_per_eval: usize,

    /// Capacity of the replay buffer.
    pub replay_buffer_capacity: usize,

    /// Batch size of optimization steps.
    pub batch_size: usize,

    /// Learning rate of all networks.
    pub learning_rate: f64,

    /// Units of the hidden layers of all networks.
    pub units: Vec<usize>,

    /// Interval of logging episode statistics in training steps.
    pub log_interval: usize,

    /// Random seed of the environments and the agent.
    pub seed: i64,

    /// Directory of monitor data, Tensorboard logs and model parameters.
    pub log_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_opts: 10_000,
            warmup_period: 1_000,
            eval_interval: 1_000,
            n_episodes_per_eval: 5,
            replay_buffer_capacity: 50_000,
            batch_size: 64,
            learning_rate: 0.001,
            units: vec![64, 64],
            log_interval: 1_000,
            seed: 42,
            log_dir: "./logs".to_string(),
        }
    }
}

impl RunConfig {
    /// Sets the number of optimization steps.
    pub fn max_opts(mut self, v: usize) -> Self {
        self.max_opts = v;
        self
    }

    /// Sets the warmup period in environment steps.
    pub fn warmup_period(mut self, v: usize) -> Self {
        self.warmup_period = v;
        self
    }

    /// Sets the interval of evaluation in optimization steps.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the number of episodes per evaluation.
    pub fn n_episodes_per_eval(mut self, v: usize) -> Self {
        self.n_episodes_per_eval = v;
        self
    }

    /// Sets the capacity of the replay buffer.
    pub fn replay_buffer_capacity(mut self, v: usize) -> Self {
        self.replay_buffer_capacity = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the units of the hidden layers.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Sets the interval of logging episode statistics.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the output directory.
    pub fn log_dir(mut self, v: impl Into<String>) -> Self {
        self.log_dir = v.into();
        self
    }

    pub(crate) fn path(&self, name: &str) -> PathBuf {
        Path::new(&self.log_dir).join(name)
    }

    /// Loads [`RunConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RunConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_run_config() -> Result<()> {
        let config = RunConfig::default()
            .max_opts(100)
            .units(vec![16, 16])
            .log_dir("/tmp/rltf");
        let dir = TempDir::new("run_config")?;
        let path = dir.path().join("run_config.yaml");
        config.save(&path)?;
        let config_ = RunConfig::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(config_.path("eval"), Path::new("/tmp/rltf/eval"));
        Ok(())
    }
}

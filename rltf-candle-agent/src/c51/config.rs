//! Configuration of C51 agent.
use crate::{dqn::DqnExplorer, value::ValueModelConfig, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`C51`](super::C51).
///
/// The output dimension of `model_config` is the number of actions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct C51Config<Q> {
    /// Configuration of the network.
    pub model_config: ValueModelConfig<Q>,

    /// Interval of soft updates of the target network.
    pub soft_update_interval: usize,

    /// The number of parameter updates per optimization step.
    pub n_updates_per_opt: usize,

    /// Batch size.
    pub batch_size: usize,

    /// Discount factor.
    pub discount_factor: f64,

    /// Soft update coefficient.
    pub tau: f64,

    /// The number of atoms.
    pub n_atoms: usize,

    /// The smallest atom.
    pub v_min: f32,

    /// The largest atom.
    pub v_max: f32,

    /// Exploration in training mode, on expected action values.
    pub explorer: DqnExplorer,

    /// Probability of a random action in evaluation mode.
    pub eps_eval: f64,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<Q> Default for C51Config<Q> {
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            soft_update_interval: 1,
            n_updates_per_opt: 1,
            batch_size: 32,
            discount_factor: 0.99,
            tau: 0.005,
            n_atoms: 51,
            v_min: -10.0,
            v_max: 10.0,
            explorer: DqnExplorer::default(),
            eps_eval: 0.001,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<Q> C51Config<Q>
where
    Q: Serialize + DeserializeOwned,
{
    /// Sets the configuration of the network.
    pub fn model_config(mut self, v: ValueModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// Sets soft update interval.
    pub fn soft_update_interval(mut self, v: usize) -> Self {
        self.soft_update_interval = v;
        self
    }

    /// Sets the number of parameter updates per optimization step.
    pub fn n_updates_per_opt(mut self, v: usize) -> Self {
        self.n_updates_per_opt = v;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the support of the distribution.
    pub fn atoms(mut self, n_atoms: usize, v_min: f32, v_max: f32) -> Self {
        self.n_atoms = n_atoms;
        self.v_min = v_min;
        self.v_max = v_max;
        self
    }

    /// Explorer.
    pub fn explorer(mut self, v: DqnExplorer) -> Self {
        self.explorer = v;
        self
    }

    /// Probability of a random action in evaluation mode.
    pub fn eps_eval(mut self, v: f64) -> Self {
        self.eps_eval = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Loads [`C51Config`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`C51Config`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

//! Configuration of bootstrapped DQN agent.
use super::BstrapPolicy;
use crate::{util::CriticLoss, value::ValueModelConfig, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`BstrapDqn`](super::BstrapDqn).
///
/// The output dimension of `model_config` is the number of actions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BstrapDqnConfig<Q> {
    /// Configuration of the network.
    pub model_config: ValueModelConfig<Q>,

    /// The number of heads.
    pub n_heads: usize,

    /// Probability that a transition is used to train a head.
    pub mask_prob: f64,

    /// Action selection in training mode.
    pub policy: BstrapPolicy,

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

    /// Loss function.
    pub critic_loss: CriticLoss,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<Q> Default for BstrapDqnConfig<Q> {
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            n_heads: 10,
            mask_prob: 1.0,
            policy: BstrapPolicy::default(),
            soft_update_interval: 1,
            n_updates_per_opt: 1,
            batch_size: 32,
            discount_factor: 0.99,
            tau: 0.005,
            critic_loss: CriticLoss::SmoothL1,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<Q> BstrapDqnConfig<Q>
where
    Q: Serialize + DeserializeOwned,
{
    /// Sets the configuration of the network.
    pub fn model_config(mut self, v: ValueModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// The number of heads.
    pub fn n_heads(mut self, v: usize) -> Self {
        self.n_heads = v;
        self
    }

    /// Probability of the bootstrap masks.
    pub fn mask_prob(mut self, v: f64) -> Self {
        self.mask_prob = v;
        self
    }

    /// Action selection in training mode.
    pub fn policy(mut self, v: BstrapPolicy) -> Self {
        self.policy = v;
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

    /// Loss function.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
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

    /// Loads [`BstrapDqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`BstrapDqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

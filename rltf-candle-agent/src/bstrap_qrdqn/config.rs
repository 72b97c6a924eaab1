//! Configuration of bootstrapped QR-DQN agent.
use crate::{util::CriticLoss, value::ValueModelConfig, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Action selection of [`BstrapQrDqn`](super::BstrapQrDqn) in training mode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum BstrapQrDqnPolicy {
    /// Greedy on the active head, resampled at the start of each episode.
    Bootstrap,

    /// Information-directed sampling. The variance of the return comes from
    /// the quantile head.
    Ids {
        /// The number of standard deviations of the confidence bounds.
        n_stds: f32,
    },
}

impl Default for BstrapQrDqnPolicy {
    fn default() -> Self {
        Self::Bootstrap
    }
}

/// Configuration of [`BstrapQrDqn`](super::BstrapQrDqn).
///
/// The output dimension of `model_config` is the number of actions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BstrapQrDqnConfig<Q> {
    /// Configuration of the network.
    pub model_config: ValueModelConfig<Q>,

    /// The number of bootstrap heads.
    pub n_heads: usize,

    /// The number of quantiles.
    pub n_quantiles: usize,

    /// Threshold of the Huber loss of quantile regression.
    pub kappa: f64,

    /// Probability that a transition is used to train a head.
    pub mask_prob: f64,

    /// Action selection in training mode.
    pub policy: BstrapQrDqnPolicy,

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

    /// Loss function of the bootstrap heads.
    pub critic_loss: CriticLoss,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<Q> Default for BstrapQrDqnConfig<Q> {
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            n_heads: 10,
            n_quantiles: 50,
            kappa: 1.0,
            mask_prob: 1.0,
            policy: BstrapQrDqnPolicy::default(),
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

impl<Q> BstrapQrDqnConfig<Q>
where
    Q: Serialize + DeserializeOwned,
{
    /// Sets the configuration of the network.
    pub fn model_config(mut self, v: ValueModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// The number of bootstrap heads.
    pub fn n_heads(mut self, v: usize) -> Self {
        self.n_heads = v;
        self
    }

    /// The number of quantiles.
    pub fn n_quantiles(mut self, v: usize) -> Self {
        self.n_quantiles = v;
        self
    }

    /// Threshold of the Huber loss.
    pub fn kappa(mut self, v: f64) -> Self {
        self.kappa = v;
        self
    }

    /// Probability of the bootstrap masks.
    pub fn mask_prob(mut self, v: f64) -> Self {
        self.mask_prob = v;
        self
    }

    /// Action selection in training mode.
    pub fn policy(mut self, v: BstrapQrDqnPolicy) -> Self {
        self.policy = v;
        self
    }

    /// Sets soft update interval.
    pub fn soft_update_interval(mut self, v: usize) -> Self {
        self.soft_update_interval = v;
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

    /// Loads [`BstrapQrDqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`BstrapQrDqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

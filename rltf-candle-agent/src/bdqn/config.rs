//! Configuration of BDQN agent.
use crate::{blr::BlrConfig, util::CriticLoss, value::ValueModelConfig, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Action selection of [`Bdqn`](super::Bdqn) in training mode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum BdqnPolicy {
    /// Greedy on weights sampled from the posterior.
    Thompson,

    /// Greedy on `mean + kappa * std` of the posterior predictive.
    Ucb {
        /// Coefficient of the standard deviation.
        kappa: f32,
    },

    /// Information-directed sampling on the posterior predictive. The variance
    /// of the return is the noise variance of the regression.
    Ids {
        /// The number of standard deviations of the confidence bounds.
        n_stds: f32,
    },
}

impl Default for BdqnPolicy {
    fn default() -> Self {
        Self::Thompson
    }
}

/// Configuration of [`Bdqn`](super::Bdqn).
///
/// The output dimension of `model_config` is the dimension of the features.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BdqnConfig<Q> {
    /// Configuration of the feature network.
    pub model_config: ValueModelConfig<Q>,

    /// The number of actions.
    pub n_actions: usize,

    /// Configuration of the regressions.
    pub blr_config: BlrConfig,

    /// Interval of refitting the posterior in optimization steps.
    pub blr_update_interval: usize,

    /// The number of transitions used to refit the posterior.
    pub blr_batch_size: usize,

    /// Interval of resampling the weights for Thompson sampling, in environment steps.
    pub sample_interval: usize,

    /// Action selection in training mode.
    pub policy: BdqnPolicy,

    /// Interval of soft updates of the target network.
    pub soft_update_interval: usize,

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

impl<Q> Default for BdqnConfig<Q> {
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            n_actions: 2,
            blr_config: BlrConfig::default(),
            blr_update_interval: 1000,
            blr_batch_size: 5000,
            sample_interval: 100,
            policy: BdqnPolicy::default(),
            soft_update_interval: 1,
            batch_size: 32,
            discount_factor: 0.99,
            tau: 0.005,
            critic_loss: CriticLoss::SmoothL1,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<Q> BdqnConfig<Q>
where
    Q: Serialize + DeserializeOwned,
{
    /// Sets the configuration of the feature network.
    pub fn model_config(mut self, v: ValueModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// The number of actions.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Configuration of the regressions.
    pub fn blr_config(mut self, v: BlrConfig) -> Self {
        self.blr_config = v;
        self
    }

    /// Interval of refitting the posterior.
    pub fn blr_update_interval(mut self, v: usize) -> Self {
        self.blr_update_interval = v;
        self
    }

    /// The number of transitions used to refit the posterior.
    pub fn blr_batch_size(mut self, v: usize) -> Self {
        self.blr_batch_size = v;
        self
    }

    /// Interval of resampling the weights.
    pub fn sample_interval(mut self, v: usize) -> Self {
        self.sample_interval = v;
        self
    }

    /// Action selection in training mode.
    pub fn policy(mut self, v: BdqnPolicy) -> Self {
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

    /// Loads [`BdqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`BdqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

//! Configuration of QR-DDPG agent.
use crate::{
    ddpg::{ActionNoiseConfig, ActorConfig, CriticConfig},
    Device,
};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`QrDdpg`](super::QrDdpg).
///
/// The output dimension of the critic is set to `n_quantiles` by the agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QrDdpgConfig<P, Q> {
    /// Configuration of the actor.
    pub actor_config: ActorConfig<P>,

    /// Configuration of the critic.
    pub critic_config: CriticConfig<Q>,

    /// Exploration noise in training mode.
    pub action_noise: ActionNoiseConfig,

    /// The number of quantiles.
    pub n_quantiles: usize,

    /// Threshold of the Huber loss.
    pub kappa: f64,

    /// The number of parameter updates per optimization step.
    pub n_updates_per_opt: usize,

    /// Batch size.
    pub batch_size: usize,

    /// Discount factor.
    pub discount_factor: f64,

    /// Soft update coefficient of the target networks.
    pub tau: f64,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<P, Q> Default for QrDdpgConfig<P, Q> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            action_noise: ActionNoiseConfig::default(),
            n_quantiles: 32,
            kappa: 1.0,
            n_updates_per_opt: 1,
            batch_size: 64,
            discount_factor: 0.99,
            tau: 0.005,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<P, Q> QrDdpgConfig<P, Q>
where
    P: Serialize + DeserializeOwned,
    Q: Serialize + DeserializeOwned,
{
    /// Configuration of the actor.
    pub fn actor_config(mut self, v: ActorConfig<P>) -> Self {
        self.actor_config = v;
        self
    }

    /// Configuration of the critic.
    pub fn critic_config(mut self, v: CriticConfig<Q>) -> Self {
        self.critic_config = v;
        self
    }

    /// Exploration noise.
    pub fn action_noise(mut self, v: ActionNoiseConfig) -> Self {
        self.action_noise = v;
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

    /// Loads [`QrDdpgConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`QrDdpgConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

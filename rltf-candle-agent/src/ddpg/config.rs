//! Configuration of DDPG agent.
use super::{ActionNoiseConfig, ActorConfig, CriticConfig};
use crate::{util::CriticLoss, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Ddpg`](super::Ddpg).
///
/// `P` and `Q` are the configurations of the policy network and the action-value network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DdpgConfig<P, Q> {
    /// Configuration of the actor.
    pub actor_config: ActorConfig<P>,

    /// Configuration of the critic.
    pub critic_config: CriticConfig<Q>,

    /// Exploration noise in training mode.
    pub action_noise: ActionNoiseConfig,

    /// The number of parameter updates per optimization step.
    pub n_updates_per_opt: usize,

    /// Batch size.
    pub batch_size: usize,

    /// Discount factor.
    pub discount_factor: f64,

    /// Soft update coefficient of the target networks.
    pub tau: f64,

    /// Loss function of the critic.
    pub critic_loss: CriticLoss,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<P, Q> Default for DdpgConfig<P, Q> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            action_noise: ActionNoiseConfig::default(),
            n_updates_per_opt: 1,
            batch_size: 64,
            discount_factor: 0.99,
            tau: 0.005,
            critic_loss: CriticLoss::Mse,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<P, Q> DdpgConfig<P, Q>
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

    /// Loss function of the critic.
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

    /// Loads [`DdpgConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DdpgConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mlp::MlpConfig, Activation};
    use tempdir::TempDir;

    #[test]
    fn test_serde_ddpg_config() -> Result<()> {
        let config = DdpgConfig::default()
            .actor_config(
                ActorConfig::default().pi_config(MlpConfig::new(3, vec![64, 64], 1, Activation::Tanh)),
            )
            .critic_config(
                CriticConfig::default().q_config(MlpConfig::new(4, vec![64, 64], 1, Activation::None)),
            )
            .action_noise(ActionNoiseConfig::Gaussian { sigma: 0.1 });

        let dir = TempDir::new("ddpg_config")?;
        let path = dir.path().join("ddpg.yaml");
        config.save(&path)?;
        assert_eq!(DdpgConfig::<MlpConfig, MlpConfig>::load(&path)?, config);
        Ok(())
    }
}

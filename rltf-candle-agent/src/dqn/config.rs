//! Configuration of DQN agent.
use super::explorer::DqnExplorer;
use crate::{util::CriticLoss, value::ValueModelConfig, Device};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[allow(clippy::upper_case_acronyms)]
/// Configuration of [`Dqn`](super::Dqn).
///
/// `Q` is the configuration of the action-value network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<Q> {
    /// Configuration of the action-value network.
    pub model_config: ValueModelConfig<Q>,

    /// Interval of soft updates of the target network in optimization steps.
    pub soft_update_interval: usize,

    /// The number of parameter updates per optimization step.
    pub n_updates_per_opt: usize,

    /// Batch size.
    pub batch_size: usize,

    /// Discount factor.
    pub discount_factor: f64,

    /// Soft update coefficient. `1.0` gives hard updates.
    pub tau: f64,

    /// Exploration in training mode.
    pub explorer: DqnExplorer,

    /// If `true`, next actions of targets are selected with the online network.
    #[serde(default)]
    pub double_dqn: bool,

    /// Loss function.
    pub critic_loss: CriticLoss,

    /// Probability of a random action in evaluation mode.
    pub eps_eval: f64,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<Q> Default for DqnConfig<Q> {
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            soft_update_interval: 1,
            n_updates_per_opt: 1,
            batch_size: 32,
            discount_factor: 0.99,
            tau: 0.005,
            explorer: DqnExplorer::default(),
            double_dqn: false,
            critic_loss: CriticLoss::SmoothL1,
            eps_eval: 0.001,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: Serialize + serde::de::DeserializeOwned,
{
    /// Sets the configuration of the action-value network.
    pub fn model_config(mut self, v: ValueModelConfig<Q>) -> Self {
        self.model_config = v;
        self
    }

    /// Sets soft update interval.
    pub fn soft_update_interval(mut self, v: usize) -> Self {
        self.soft_update_interval = v;
        self
    }

    /// Sets the number of parameter update steps per optimization step.
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

    /// Explorer.
    pub fn explorer(mut self, v: DqnExplorer) -> Self {
        self.explorer = v;
        self
    }

    /// Uses the double DQN target.
    pub fn double_dqn(mut self, v: bool) -> Self {
        self.double_dqn = v;
        self
    }

    /// Loss function.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
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

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`].
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
    fn test_serde_dqn_config() -> Result<()> {
        let q_config = MlpConfig::new(4, vec![64, 64], 2, Activation::None);
        let config = DqnConfig::default()
            .model_config(ValueModelConfig::default().q_config(q_config))
            .double_dqn(true)
            .batch_size(64);

        let dir = TempDir::new("dqn_config")?;
        let path = dir.path().join("dqn_config.yaml");
        config.save(&path)?;
        let config_ = DqnConfig::<MlpConfig>::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}

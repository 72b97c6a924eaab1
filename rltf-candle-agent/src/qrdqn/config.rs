//! Configuration of QR-DQN agent.
use crate::{dqn::DqnExplorer, value::ValueModelConfig, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Action selection of [`QrDqn`](super::QrDqn) in training mode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum QrDqnPolicy {
    /// The explorer on the mean of the quantiles.
    Greedy(DqnExplorer),

    /// Greedy on one quantile sampled uniformly for each action.
    ThompsonSampling,
}

impl Default for QrDqnPolicy {
    fn default() -> Self {
        Self::Greedy(DqnExplorer::default())
    }
}

/// Configuration of [`QrDqn`](super::QrDqn).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QrDqnConfig<Q> {
    /// Configuration of the network. Its output dimension is the number of actions.
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

    /// The number of quantiles.
    pub n_quantiles: usize,

    /// Threshold of the Huber loss.
    pub kappa: f64,

    /// Action selection in training mode.
    pub policy: QrDqnPolicy,

    /// Probability of a random action in evaluation mode.
    pub eps_eval: f64,

    /// Device.
    pub device: Device,

    /// Random seed.
    pub seed: u64,
}

impl<Q> Default for QrDqnConfig<Q> {
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            soft_update_interval: 1,
            n_updates_per_opt: 1,
            batch_size: 32,
            discount_factor: 0.99,
            tau: 0.005,
            n_quantiles: 50,
            kappa: 1.0,
            policy: QrDqnPolicy::default(),
            eps_eval: 0.001,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl<Q> QrDqnConfig<Q>
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

    /// Action selection in training mode.
    pub fn policy(mut self, v: QrDqnPolicy) -> Self {
        self.policy = v;
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

    /// Loads [`QrDqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`QrDqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::MlpConfig;
    use crate::Activation;
    use tempdir::TempDir;

    #[test]
    fn test_serde_qrdqn_config() -> Result<()> {
        let config = QrDqnConfig::default()
            .model_config(
                ValueModelConfig::default().q_config(MlpConfig::new(4, vec![32], 2, Activation::None)),
            )
            .n_quantiles(8)
            .policy(QrDqnPolicy::ThompsonSampling);

        let dir = TempDir::new("qrdqn_config")?;
        let path = dir.path().join("qrdqn.yaml");
        config.save(&path)?;
        assert_eq!(QrDqnConfig::<MlpConfig>::load(&path)?, config);
        Ok(())
    }
}

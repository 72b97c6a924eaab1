//! Exploration noise of deterministic policies.
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Configuration of [`ActionNoise`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum ActionNoiseConfig {
    /// Ornstein-Uhlenbeck process `x += theta * (0 - x) + sigma * N(0, 1)`.
    OrnsteinUhlenbeck {
        /// Rate of mean reversion.
        theta: f64,

        /// Scale of the noise.
        sigma: f64,
    },

    /// Independent Gaussian noise.
    Gaussian {
        /// Standard deviation.
        sigma: f64,
    },
}

impl Default for ActionNoiseConfig {
    fn default() -> Self {
        Self::OrnsteinUhlenbeck {
            theta: 0.15,
            sigma: 0.2,
        }
    }
}

/// Noise added to actions in training mode.
pub struct ActionNoise {
    config: ActionNoiseConfig,
    state: Vec<f64>,
}

impl ActionNoise {
    /// Noise of actions of dimension `dim`.
    pub fn new(config: ActionNoiseConfig, dim: usize) -> Self {
        Self {
            config,
            state: vec![0.0; dim],
        }
    }

    /// Resets the state of the process.
    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Samples noise of the next step.
    pub fn sample<R: Rng>(&mut self, rng: &mut R) -> Vec<f32> {
        match &self.config {
            ActionNoiseConfig::OrnsteinUhlenbeck { theta, sigma } => {
                for x in self.state.iter_mut() {
                    let z: f64 = rng.sample(StandardNormal);
                    *x += -theta * *x + sigma * z;
                }
                self.state.iter().map(|&x| x as f32).collect()
            }
            ActionNoiseConfig::Gaussian { sigma } => self
                .state
                .iter()
                .map(|_| (sigma * rng.sample::<f64, _>(StandardNormal)) as f32)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_ou_noise_is_correlated_and_resets() {
        let mut noise = ActionNoise::new(
            ActionNoiseConfig::OrnsteinUhlenbeck {
                theta: 0.0,
                sigma: 1.0,
            },
            2,
        );
        let mut rng = SmallRng::seed_from_u64(0);
        let n = (0..400).map(|_| noise.sample(&mut rng)).last().unwrap();
        // Without mean reversion, the process is a random walk.
        assert!(n.iter().any(|v| v.abs() > 1.0));
        noise.reset();
        assert_eq!(noise.state, vec![0.0, 0.0]);
    }

    #[test]
    fn test_gaussian_noise() {
        let mut noise = ActionNoise::new(ActionNoiseConfig::Gaussian { sigma: 0.1 }, 3);
        let mut rng = SmallRng::seed_from_u64(0);
        let xs = (0..1000).flat_map(|_| noise.sample(&mut rng)).collect::<Vec<_>>();
        let var = xs.iter().map(|x| x * x).sum::<f32>() / xs.len() as f32;
        assert!((var - 0.01).abs() < 0.002);
    }
}

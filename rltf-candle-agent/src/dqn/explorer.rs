//! Exploration strategies of DQN.
use anyhow::Result;
use candle_core::{DType, Tensor, D};
use candle_nn::ops::softmax;
use rand::{distributions::WeightedIndex, Rng};
use serde::{Deserialize, Serialize};

/// Explorers for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum DqnExplorer {
    /// Softmax action selection.
    Softmax(Softmax),

    /// Epsilon-greedy action selection.
    EpsilonGreedy(EpsilonGreedy),
}

impl Default for DqnExplorer {
    fn default() -> Self {
        Self::EpsilonGreedy(EpsilonGreedy::new())
    }
}

impl DqnExplorer {
    /// Takes actions based on action values of the shape `[batch_size, n_actions]`,
    /// returns an `i64` tensor of the shape `[batch_size]`.
    pub fn action(&mut self, q: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        match self {
            Self::Softmax(softmax) => softmax.action(q, rng),
            Self::EpsilonGreedy(egreedy) => egreedy.action(q, rng),
        }
    }
}

/// Uniformly random actions of the shape `[batch_size]`.
pub(crate) fn random_actions(q: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
    let (n_samples, n_actions) = q.dims2()?;
    let data = (0..n_samples)
        .map(|_| rng.gen_range(0..n_actions) as i64)
        .collect::<Vec<_>>();
    Ok(Tensor::from_vec(data, (n_samples,), q.device())?)
}

/// Softmax explorer for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Softmax {}

#[allow(clippy::new_without_default)]
impl Softmax {
    /// Constructs softmax explorer.
    pub fn new() -> Self {
        Self {}
    }

    /// Samples actions with probabilities proportional to `exp(q)`.
    pub fn action(&mut self, q: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        let probs = softmax(q, D::Minus1)?.to_vec2::<f32>()?;
        let n_samples = probs.len();
        let data = probs
            .iter()
            .map(|p| Ok(rng.sample(WeightedIndex::new(p)?) as i64))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::from_vec(data, (n_samples,), q.device())?)
    }
}

/// Epsilon-greedy explorer for DQN.
///
/// Epsilon decreases linearly from `eps_start` to `eps_final` over `final_step` actions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// The number of actions taken so far.
    pub n_opts: usize,

    /// Initial value of epsilon.
    pub eps_start: f64,

    /// Final value of epsilon.
    pub eps_final: f64,

    /// The number of actions after which epsilon reaches `eps_final`.
    pub final_step: usize,
}

#[allow(clippy::new_without_default)]
impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new() -> Self {
        Self {
            n_opts: 0,
            eps_start: 1.0,
            eps_final: 0.02,
            final_step: 100_000,
        }
    }

    /// Constructs epsilon-greedy explorer with the given final step.
    pub fn with_final_step(final_step: usize) -> DqnExplorer {
        DqnExplorer::EpsilonGreedy(Self {
            final_step,
            ..Self::new()
        })
    }

    /// Current value of epsilon.
    pub fn eps(&self) -> f64 {
        let d = (self.eps_start - self.eps_final) / (self.final_step.max(1) as f64);
        (self.eps_start - d * self.n_opts as f64).max(self.eps_final)
    }

    /// Takes actions based on action values.
    pub fn action(&mut self, q: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        let is_random = rng.gen::<f64>() < self.eps();
        self.n_opts += 1;

        match is_random {
            true => random_actions(q, rng),
            false => Ok(q.argmax(D::Minus1)?.to_dtype(DType::I64)?),
        }
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(mut self, v: f64) -> Self {
        self.eps_final = v;
        self
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_epsilon_decay() -> Result<()> {
        let mut egreedy = EpsilonGreedy {
            n_opts: 0,
            eps_start: 1.0,
            eps_final: 0.0,
            final_step: 4,
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let q = Tensor::from_slice(&[0.0f32, 1.0, 0.5], (1, 3), &Device::Cpu)?;

        for _ in 0..4 {
            egreedy.action(&q, &mut rng)?;
        }
        assert_eq!(egreedy.eps(), 0.0);
        let a = egreedy.action(&q, &mut rng)?.to_vec1::<i64>()?;
        assert_eq!(a, vec![1]);
        Ok(())
    }
}

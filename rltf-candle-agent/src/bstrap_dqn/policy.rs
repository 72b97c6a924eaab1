//! Action selection from ensemble heads.
use crate::{
    ids::{ids_action, mean_std},
    util::argmax,
};
use serde::{Deserialize, Serialize};

/// How actions are selected from the heads in training mode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum BstrapPolicy {
    /// Greedy on the active head, which is resampled at the start of each episode.
    Bootstrap,

    /// Majority vote of the greedy actions of the heads.
    Ensemble,

    /// Greedy on `mean + kappa * std` over the heads.
    Ucb {
        /// Coefficient of the standard deviation.
        kappa: f32,
    },

    /// Information-directed sampling with mean and standard deviation over the heads.
    Ids {
        /// The number of standard deviations of the confidence bounds.
        n_stds: f32,

        /// Variance of the return, the same for all actions.
        rho2: f32,
    },
}

impl Default for BstrapPolicy {
    fn default() -> Self {
        Self::Bootstrap
    }
}

impl BstrapPolicy {
    /// Takes an action given `q_heads[k][a]`, the value of action `a` of head `k`.
    pub fn action(&self, q_heads: &[Vec<f32>], active_head: usize) -> usize {
        match self {
            Self::Bootstrap => argmax(&q_heads[active_head]),
            Self::Ensemble => majority_vote(q_heads),
            Self::Ucb { kappa } => {
                let (mean, std) = mean_std(q_heads);
                let ucb = mean
                    .iter()
                    .zip(std.iter())
                    .map(|(m, s)| m + kappa * s)
                    .collect::<Vec<_>>();
                argmax(&ucb)
            }
            Self::Ids { n_stds, rho2 } => {
                let (mean, std) = mean_std(q_heads);
                let rho2 = vec![*rho2; mean.len()];
                ids_action(&mean, &std, &rho2, *n_stds)
            }
        }
    }
}

/// The action chosen by most heads. Ties go to the smallest action index.
pub fn majority_vote(q_heads: &[Vec<f32>]) -> usize {
    let n_actions = q_heads.first().map(|q| q.len()).unwrap_or(0);
    let mut votes = vec![0usize; n_actions];
    for q in q_heads.iter() {
        votes[argmax(q)] += 1;
    }

    let mut best = 0;
    for (a, &v) in votes.iter().enumerate() {
        if v > votes[best] {
            best = a;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heads() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.5],
            vec![0.0, 1.0, 0.9],
            vec![0.0, 1.2, 1.1],
            vec![0.0, -1.0, 3.0],
        ]
    }

    #[test]
    fn test_bootstrap_and_vote() {
        let q = heads();
        assert_eq!(BstrapPolicy::Bootstrap.action(&q, 0), 0);
        assert_eq!(BstrapPolicy::Bootstrap.action(&q, 3), 2);
        assert_eq!(BstrapPolicy::Ensemble.action(&q, 0), 1);
        assert_eq!(majority_vote(&[vec![1.0, 0.0], vec![0.0, 1.0]]), 0);
    }

    #[test]
    fn test_ucb() {
        let q = heads();
        // Means: 0.25, 0.3, 1.375. Action 2 wins with or without the bonus.
        assert_eq!(BstrapPolicy::Ucb { kappa: 0.0 }.action(&q, 0), 2);
        assert_eq!(BstrapPolicy::Ucb { kappa: 1.0 }.action(&q, 0), 2);
    }
}

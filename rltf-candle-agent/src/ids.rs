//! Information-directed sampling.
//!
//! Given means `mu`, standard deviations `sigma` of action values and the
//! variance `rho2` of the return of each action, IDS takes
//!
//! ```text
//! regret_a = max_b (mu_b + l * sigma_b) - (mu_a - l * sigma_a)
//! gain_a   = ln(1 + sigma_a^2 / rho2_a) + 1e-5
//! a*       = argmin_a regret_a^2 / gain_a
//! ```
//!
//! where `l` is the number of standard deviations of the confidence bounds.
use crate::util::argmin;

const GAIN_EPS: f32 = 1e-5;

/// Returns the action of information-directed sampling.
///
/// The slices have one element per action.
pub fn ids_action(mean: &[f32], std: &[f32], rho2: &[f32], n_stds: f32) -> usize {
    let ucb_max = mean
        .iter()
        .zip(std.iter())
        .map(|(m, s)| m + n_stds * s)
        .fold(f32::NEG_INFINITY, f32::max);

    let ratio = mean
        .iter()
        .zip(std.iter())
        .zip(rho2.iter())
        .map(|((m, s), r)| {
            let regret = ucb_max - (m - n_stds * s);
            let gain = (1.0 + s * s / r).ln() + GAIN_EPS;
            regret * regret / gain
        })
        .collect::<Vec<_>>();

    argmin(&ratio)
}

/// Means and standard deviations over samples, e.g. ensemble heads.
///
/// `samples[k][a]` is the value of action `a` in sample `k`.
pub fn mean_std(samples: &[Vec<f32>]) -> (Vec<f32>, Vec<f32>) {
    let n = samples.len().max(1) as f32;
    let n_actions = samples.first().map(|s| s.len()).unwrap_or(0);
    let mean = (0..n_actions)
        .map(|a| samples.iter().map(|s| s[a]).sum::<f32>() / n)
        .collect::<Vec<_>>();
    let std = (0..n_actions)
        .map(|a| {
            let var = samples.iter().map(|s| (s[a] - mean[a]).powi(2)).sum::<f32>() / n;
            var.sqrt()
        })
        .collect::<Vec<_>>();
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_prefers_informative_action() {
        // Equal means: the action with larger uncertainty has the same regret
        // bound but more information.
        let a = ids_action(&[1.0, 1.0], &[0.1, 1.0], &[1.0, 1.0], 1.0);
        assert_eq!(a, 1);
    }

    #[test]
    fn test_ids_avoids_clearly_bad_action() {
        let a = ids_action(&[10.0, 0.0], &[0.5, 0.5], &[1.0, 1.0], 1.0);
        assert_eq!(a, 0);
    }

    #[test]
    fn test_mean_std() {
        let (m, s) = mean_std(&[vec![1.0, 0.0], vec![3.0, 0.0]]);
        assert_eq!(m, vec![2.0, 0.0]);
        assert_eq!(s, vec![1.0, 0.0]);
    }
}

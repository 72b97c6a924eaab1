//! Bayesian linear regression.
//!
//! The model is `y = w^T x + e` with the prior `w ~ N(0, prior_var * I)` and
//! the noise `e ~ N(0, noise_var)`. The posterior of `w` is Gaussian with
//!
//! ```text
//! precision = X^T X / noise_var + I / prior_var
//! mean      = precision^-1 X^T y / noise_var
//! ```
//!
//! The precision matrix is kept together with its Cholesky factor `L`, which is
//! used for posterior sampling `w = mean + L^-T z` and predictive variances
//! `x^T precision^-1 x = |L^-1 x|^2`.
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;
use rltf_core::error::RltfError;
use serde::{Deserialize, Serialize};

/// Configuration of [`Blr`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BlrConfig {
    /// Variance of the prior of the weights.
    pub prior_var: f64,

    /// Variance of the observation noise.
    pub noise_var: f64,
}

impl Default for BlrConfig {
    fn default() -> Self {
        Self {
            prior_var: 10.0,
            noise_var: 1.0,
        }
    }
}

impl BlrConfig {
    /// Variance of the prior.
    pub fn prior_var(mut self, v: f64) -> Self {
        self.prior_var = v;
        self
    }

    /// Variance of the observation noise.
    pub fn noise_var(mut self, v: f64) -> Self {
        self.noise_var = v;
        self
    }
}

/// Lower triangular `L` with `a = L L^T`.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>, RltfError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let s = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum::<f64>();
            if i == j {
                let d = a[[i, i]] - s;
                if d <= 0.0 || !d.is_finite() {
                    return Err(RltfError::NotPositiveDefinite(i));
                }
                l[[i, j]] = d.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - s) / l[[j, j]];
            }
        }
    }

    Ok(l)
}

/// Solves `L x = b` for lower triangular `L`.
fn solve_lower(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s = (0..i).map(|k| l[[i, k]] * x[k]).sum::<f64>();
        x[i] = (b[i] - s) / l[[i, i]];
    }
    x
}

/// Solves `L^T x = b` for lower triangular `L`.
fn solve_lower_t(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum::<f64>();
        x[i] = (b[i] - s) / l[[i, i]];
    }
    x
}

/// Bayesian linear regression with a Gaussian prior and Gaussian noise.
#[derive(Debug, Clone)]
pub struct Blr {
    config: BlrConfig,
    mean: Array1<f64>,
    precision: Array2<f64>,
    chol: Array2<f64>,
}

impl Blr {
    /// The prior over weights of dimension `dim`.
    pub fn new(dim: usize, config: BlrConfig) -> Self {
        let precision = Array2::<f64>::eye(dim) / config.prior_var;
        let chol = Array2::<f64>::eye(dim) / config.prior_var.sqrt();

        Self {
            config,
            mean: Array1::zeros(dim),
            precision,
            chol,
        }
    }

    /// Constructs the model from the mean and precision of a posterior.
    pub fn from_posterior(mean: Array1<f64>, precision: Array2<f64>, config: BlrConfig) -> Result<Self> {
        let chol = cholesky(&precision)?;
        Ok(Self {
            config,
            mean,
            precision,
            chol,
        })
    }

    /// Dimension of the weights.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Posterior mean.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Posterior precision.
    pub fn precision(&self) -> &Array2<f64> {
        &self.precision
    }

    /// Computes the posterior given inputs `x` of the shape `[n, dim]` and targets `y`,
    /// starting from the prior.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let dim = self.dim();
        let precision =
            x.t().dot(x) / self.config.noise_var + Array2::<f64>::eye(dim) / self.config.prior_var;
        let chol = cholesky(&precision)?;
        let b = x.t().dot(y) / self.config.noise_var;
        let z = solve_lower(&chol, b.view());

        self.mean = solve_lower_t(&chol, z.view());
        self.precision = precision;
        self.chol = chol;
        Ok(())
    }

    /// Posterior mean of the prediction at `x`.
    pub fn predict(&self, x: ArrayView1<f64>) -> f64 {
        self.mean.dot(&x)
    }

    /// Posterior variance of the prediction at `x`, without observation noise.
    pub fn predictive_var(&self, x: ArrayView1<f64>) -> f64 {
        let v = solve_lower(&self.chol, x);
        v.dot(&v)
    }

    /// Draws weights from the posterior.
    pub fn sample_weights<R: Rng>(&self, rng: &mut R) -> Array1<f64> {
        let z = (0..self.dim())
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect::<Array1<f64>>();
        &self.mean + &solve_lower_t(&self.chol, z.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_cholesky() -> Result<()> {
        let a = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let l = cholesky(&a)?;
        let a_ = l.dot(&l.t());
        for (v, e) in a_.iter().zip(a.iter()) {
            assert!((v - e).abs() < 1e-12);
        }
        assert_eq!(l[[0, 1]], 0.0);

        let b = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert_eq!(cholesky(&b), Err(RltfError::NotPositiveDefinite(1)));
        Ok(())
    }

    #[test]
    fn test_fit_recovers_weights() -> Result<()> {
        let xs = (0..50)
            .map(|i| [1.0, i as f64 / 10.0])
            .collect::<Vec<_>>();
        let x = arr2(&xs);
        let y = x.dot(&arr1(&[0.5, 2.0]));
        let mut blr = Blr::new(2, BlrConfig::default().noise_var(0.01));
        let var_prior = blr.predictive_var(arr1(&[1.0, 1.0]).view());
        blr.fit(&x, &y)?;

        assert!((blr.mean()[0] - 0.5).abs() < 1e-2);
        assert!((blr.mean()[1] - 2.0).abs() < 1e-2);
        assert!((blr.predict(arr1(&[1.0, 1.0]).view()) - 2.5).abs() < 1e-2);
        assert!(blr.predictive_var(arr1(&[1.0, 1.0]).view()) < var_prior);
        Ok(())
    }

    #[test]
    fn test_posterior_samples() -> Result<()> {
        let mean = arr1(&[1.0, -1.0]);
        let precision = arr2(&[[100.0, 0.0], [0.0, 25.0]]);
        let blr = Blr::from_posterior(mean, precision, BlrConfig::default())?;
        let mut rng = SmallRng::seed_from_u64(0);
        let n = 2000;
        let samples = (0..n).map(|_| blr.sample_weights(&mut rng)).collect::<Vec<_>>();

        let m0 = samples.iter().map(|w| w[0]).sum::<f64>() / n as f64;
        let v1 = samples.iter().map(|w| (w[1] + 1.0).powi(2)).sum::<f64>() / n as f64;
        assert!((m0 - 1.0).abs() < 0.02);
        assert!((v1 - 0.04).abs() < 0.01);
        assert!((blr.predictive_var(arr1(&[0.0, 1.0]).view()) - 0.04).abs() < 1e-12);
        Ok(())
    }
}

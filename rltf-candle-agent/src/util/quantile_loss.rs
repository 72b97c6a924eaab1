//! Losses of quantile regression.
use anyhow::Result;
use candle_core::{Device, Tensor};

/// Elementwise Huber loss with threshold `kappa`.
pub fn huber(u: &Tensor, kappa: f64) -> Result<Tensor> {
    let abs = u.abs()?;
    let quad = (abs.sqr()? * 0.5)?;
    let lin = ((&abs - 0.5 * kappa)? * kappa)?;
    Ok(abs.le(kappa)?.where_cond(&quad, &lin)?)
}

/// Elementwise quantile Huber loss `|tau - 1{u < 0}| * huber(u) / kappa`.
///
/// `u` is the difference of target and predicted quantiles and `tau` the quantile
/// levels of the predictions, broadcastable to `u`.
pub fn quantile_huber_loss(u: &Tensor, tau: &Tensor, kappa: f64) -> Result<Tensor> {
    let indicator = u.lt(0.0)?.to_dtype(u.dtype())?;
    let weight = tau.broadcast_sub(&indicator)?.abs()?;
    Ok(((weight * huber(u, kappa)?)? / kappa)?)
}

/// Quantile regression loss of each sample, of the shape `[batch_size]`.
///
/// `theta` are predicted quantiles and `tgt` target quantiles, both of the shape
/// `[batch_size, n_quantiles]`. `tau` are the levels of the predicted quantiles.
pub fn quantile_regression_loss(theta: &Tensor, tgt: &Tensor, tau: &Tensor, kappa: f64) -> Result<Tensor> {
    let n = tau.dims1()?;
    let u = tgt.unsqueeze(1)?.broadcast_sub(&theta.unsqueeze(2)?)?;
    let tau = tau.reshape((1, n, 1))?;
    Ok(quantile_huber_loss(&u, &tau, kappa)?.mean(2)?.sum(1)?)
}

/// Quantile levels `(2i + 1) / 2N` of `n` quantiles.
pub fn quantile_midpoints(n: usize, device: &Device) -> Result<Tensor> {
    let tau = (0..n)
        .map(|i| (2 * i + 1) as f32 / (2 * n) as f32)
        .collect::<Vec<_>>();
    Ok(Tensor::from_vec(tau, (n,), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_huber_loss() -> Result<()> {
        let u = Tensor::from_slice(&[-2.0f32, 0.5], (2,), &Device::Cpu)?;
        let tau = Tensor::from_slice(&[0.25f32], (1,), &Device::Cpu)?;
        let loss = quantile_huber_loss(&u, &tau, 1.0)?.to_vec1::<f32>()?;
        assert!((loss[0] - 1.125).abs() < 1e-6);
        assert!((loss[1] - 0.03125).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_quantile_regression_loss() -> Result<()> {
        let tau = quantile_midpoints(2, &Device::Cpu)?;
        let theta = Tensor::from_slice(&[0.0f32, 1.0, 0.0, 0.0], (2, 2), &Device::Cpu)?;
        let tgt = Tensor::from_slice(&[0.0f32, 1.0, 2.0, 2.0], (2, 2), &Device::Cpu)?;
        let loss = quantile_regression_loss(&theta, &tgt, &tau, 1.0)?.to_vec1::<f32>()?;
        assert_eq!(loss.len(), 2);
        // Only the second sample is off: u = 2 everywhere, huber(2) = 1.5.
        // (0.25 * 1.5 + 0.75 * 1.5)
        assert!(loss[0] > 0.0 && loss[0] < loss[1]);
        assert!((loss[1] - 1.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_quantile_midpoints() -> Result<()> {
        let tau = quantile_midpoints(4, &Device::Cpu)?.to_vec1::<f32>()?;
        assert_eq!(tau, vec![0.125, 0.375, 0.625, 0.875]);
        Ok(())
    }
}

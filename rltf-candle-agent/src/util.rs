//! Utilities.
use crate::TensorTransitionBatch;
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarMap;
use log::trace;
use ordered_float::OrderedFloat;
use rltf_core::{
    record::{Record, RecordValue},
    TransitionBatch,
};
use serde::{Deserialize, Serialize};
mod quantile_loss;
pub use quantile_loss::{huber, quantile_huber_loss, quantile_midpoints, quantile_regression_loss};

/// Critic loss type.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

impl CriticLoss {
    /// Elementwise loss between predictions and targets.
    pub fn elementwise(&self, pred: &Tensor, tgt: &Tensor) -> Result<Tensor> {
        let d = (pred - tgt)?;
        match self {
            Self::Mse => Ok(d.sqr()?),
            Self::SmoothL1 => huber(&d, 1.0),
        }
    }
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    trace!("src");
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is not in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1_loss(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    Ok(huber(&(x - y)?, 1.0)?.mean_all()?)
}

/// Mean of `loss` over the batch, weighted with importance weights if given.
pub fn weighted_mean(loss: &Tensor, weight: Option<&Tensor>) -> Result<Tensor> {
    match weight {
        Some(w) => Ok((loss * w)?.mean_all()?),
        None => Ok(loss.mean_all()?),
    }
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> Result<f32> {
    Ok(t.broadcast_sub(&t.mean_all()?)?
        .sqr()?
        .mean_all()?
        .sqrt()?
        .to_dtype(DType::F32)?
        .to_scalar::<f32>()?)
}

/// Returns the mean and standard deviation of the parameters.
pub fn param_stats(varmap: &VarMap) -> Result<Record> {
    let mut record = Record::empty();

    for (k, v) in varmap.data().lock().map_err(|e| anyhow!("{}", e))?.iter() {
        let m: f32 = v.mean_all()?.to_dtype(DType::F32)?.to_scalar()?;
        record.insert(format!("{}_mean", &k), RecordValue::Scalar(m));
        record.insert(format!("{}_std", &k), RecordValue::Scalar(std(v.as_tensor())?));
    }

    Ok(record)
}

/// Index of the maximum value.
pub fn argmax(vs: &[f32]) -> usize {
    vs.iter()
        .enumerate()
        .max_by_key(|(_, v)| OrderedFloat(**v))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Index of the minimum value.
pub fn argmin(vs: &[f32]) -> usize {
    vs.iter()
        .enumerate()
        .min_by_key(|(_, v)| OrderedFloat(**v))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Greedy actions of a batch of action values of the shape `[batch_size, n_actions]`,
/// as an `i64` tensor of the shape `[batch_size]`.
pub fn greedy(q: &Tensor) -> Result<Tensor> {
    Ok(q.argmax(D::Minus1)?.to_dtype(DType::I64)?)
}

/// Picks rows of `x` of the shape `[batch_size, n_actions, n]` at actions `a`
/// of the shape `[batch_size, 1]`, giving a tensor of the shape `[batch_size, n]`.
pub fn gather_actions(x: &Tensor, a: &Tensor) -> Result<Tensor> {
    let (batch_size, _, n) = x.dims3()?;
    let ix = a
        .to_dtype(DType::U32)?
        .unsqueeze(2)?
        .broadcast_as((batch_size, 1, n))?
        .contiguous()?;
    Ok(x.contiguous()?.gather(&ix, 1)?.squeeze(1)?)
}

/// Tensors of a transition batch, on the device of an agent.
pub struct TransitionTensors {
    /// Observations `o_t`.
    pub obs: Tensor,

    /// Actions `a_t`, of the shape `[batch_size, act_dim]`.
    pub act: Tensor,

    /// Observations `o_t+1`.
    pub next_obs: Tensor,

    /// Rewards of the shape `[batch_size]`.
    pub reward: Tensor,

    /// Discount factor, or `0` where the episode terminated, of the shape `[batch_size]`.
    pub discount: Tensor,

    /// Indices of the transitions in the replay buffer.
    pub ixs: Option<Vec<usize>>,

    /// Importance weights of prioritized experience replay, of the shape `[batch_size]`.
    pub weight: Option<Tensor>,
}

impl TransitionTensors {
    /// Unpacks a batch.
    ///
    /// Truncated episodes keep the bootstrapped value of the next observation.
    pub fn from_batch(batch: TensorTransitionBatch, gamma: f64, device: &Device) -> Result<Self> {
        let batch_size = batch.len();
        let (obs, act, next_obs, reward, is_terminated, _is_truncated, ixs, weight) =
            batch.unpack();
        let act = act.into_tensor()?.to_device(device)?;
        let act = act.reshape((batch_size, act.elem_count() / batch_size))?;
        let discount = is_terminated
            .iter()
            .map(|&t| (1 - t) as f32 * gamma as f32)
            .collect::<Vec<_>>();

        Ok(Self {
            obs: obs.into_tensor()?.to_device(device)?,
            act,
            next_obs: next_obs.into_tensor()?.to_device(device)?,
            reward: Tensor::from_slice(&reward[..], (batch_size,), device)?,
            discount: Tensor::from_slice(&discount[..], (batch_size,), device)?,
            ixs,
            weight: match weight {
                Some(w) => Some(Tensor::from_slice(&w[..], (batch_size,), device)?),
                None => None,
            },
        })
    }

    /// The number of transitions.
    pub fn batch_size(&self) -> usize {
        self.reward.dims()[0]
    }

    /// Discrete actions as `u32` indices of the shape `[batch_size, 1]`.
    pub fn act_ixs(&self) -> Result<Tensor> {
        Ok(self.act.to_dtype(DType::U32)?.contiguous()?)
    }

    /// Bellman targets `r + discount * v` for next state values `v` of the shape
    /// `[batch_size]` or `[batch_size, n]`.
    pub fn bellman_target(&self, v: &Tensor) -> Result<Tensor> {
        let (reward, discount) = match v.rank() {
            1 => (self.reward.clone(), self.discount.clone()),
            _ => (self.reward.unsqueeze(1)?, self.discount.unsqueeze(1)?),
        };
        Ok(reward.broadcast_add(&discount.broadcast_mul(v)?)?.detach())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::Init;

    fn varmap(vs: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((vs.len(),), "var1", init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(vs, (vs.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t)?;
        Ok(vm)
    }

    #[test]
    fn test_track() -> Result<()> {
        let vm_src = varmap(&[1.0, 2.0, 3.0])?;
        let vm_dest = varmap(&[4.0, 5.0, 6.0])?;
        track(&vm_dest, &vm_src, 0.7)?;

        let t = vm_dest.data().lock().unwrap()["var1"].as_tensor().to_vec1::<f32>()?;
        for (v, e) in t.iter().zip([1.9f32, 2.9, 3.9].iter()) {
            assert!((v - e).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_smooth_l1_loss() -> Result<()> {
        let x = Tensor::from_slice(&[0.0f32, 0.5, 3.0], (3,), &Device::Cpu)?;
        let y = Tensor::zeros((3,), DType::F32, &Device::Cpu)?;
        let loss = smooth_l1_loss(&x, &y)?.to_scalar::<f32>()?;
        // (0 + 0.125 + 2.5) / 3
        assert!((loss - 0.875).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_param_stats() -> Result<()> {
        let vm = varmap(&[1.0, 2.0, 3.0])?;
        let record = param_stats(&vm)?;
        assert!((record.get_scalar("var1_mean")? - 2.0).abs() < 1e-6);
        assert!((record.get_scalar("var1_std")? - (2.0f32 / 3.0).sqrt()).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_gather_actions() -> Result<()> {
        let x = Tensor::arange(0f32, 12.0, &Device::Cpu)?.reshape((2, 3, 2))?;
        let a = Tensor::from_slice(&[2i64, 0], (2, 1), &Device::Cpu)?;
        let rows = gather_actions(&x, &a)?.to_vec2::<f32>()?;
        assert_eq!(rows, vec![vec![4.0, 5.0], vec![6.0, 7.0]]);
        Ok(())
    }

    #[test]
    fn test_argmax_argmin() {
        assert_eq!(argmax(&[0.1, 3.0, -1.0]), 1);
        assert_eq!(argmin(&[0.1, 3.0, -1.0]), 2);
    }
}

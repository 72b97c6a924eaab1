//! Observation and action types shared by the environments.
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use rltf_candle_agent::TensorBatch;
use rltf_core::{Act, Obs};

/// Observation of the shape `[1, obs_dim]`.
#[derive(Clone, Debug)]
pub struct ClassicObs(pub Tensor);

impl ClassicObs {
    pub(crate) fn from_slice(xs: &[f32]) -> Result<Self> {
        Ok(Self(Tensor::from_slice(xs, (1, xs.len()), &Device::Cpu)?))
    }

    /// Returns the values of the observation.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        Ok(self.0.flatten_all()?.to_dtype(DType::F32)?.to_vec1()?)
    }
}

impl Obs for ClassicObs {
    fn len(&self) -> usize {
        self.0.dims().first().copied().unwrap_or(0)
    }
}

impl From<ClassicObs> for Tensor {
    fn from(obs: ClassicObs) -> Tensor {
        obs.0
    }
}

impl From<ClassicObs> for TensorBatch {
    fn from(obs: ClassicObs) -> Self {
        TensorBatch::from_tensor(obs.0)
    }
}

/// Action given as a tensor.
///
/// Discrete actions are `i64` tensors of the shape `[1]`, continuous actions
/// are `f32` tensors of the shape `[1, act_dim]`.
#[derive(Clone, Debug)]
pub struct ClassicAct(pub Tensor);

impl ClassicAct {
    /// Creates a discrete action.
    pub fn discrete(a: i64) -> Result<Self> {
        Ok(Self(Tensor::from_slice(&[a], (1,), &Device::Cpu)?))
    }

    /// Creates a continuous action.
    pub fn continuous(a: &[f32]) -> Result<Self> {
        Ok(Self(Tensor::from_slice(a, (1, a.len()), &Device::Cpu)?))
    }

    pub(crate) fn to_discrete(&self) -> Result<i64> {
        let a = self.0.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
        a.first().copied().context("Empty action")
    }

    pub(crate) fn to_continuous(&self) -> Result<Vec<f32>> {
        Ok(self.0.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }
}

impl Act for ClassicAct {}

impl From<Tensor> for ClassicAct {
    fn from(t: Tensor) -> Self {
        Self(t)
    }
}

impl From<ClassicAct> for Tensor {
    fn from(act: ClassicAct) -> Tensor {
        act.0
    }
}

impl From<ClassicAct> for TensorBatch {
    fn from(act: ClassicAct) -> Self {
        TensorBatch::from_tensor(act.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rltf_core::generic_replay_buffer::BatchBase;

    #[test]
    fn test_store_in_tensor_batch() -> Result<()> {
        let mut obs = TensorBatch::new(4);
        obs.push(0, ClassicObs::from_slice(&[1.0, 2.0, 3.0])?.into())?;
        obs.push(1, ClassicObs::from_slice(&[4.0, 5.0, 6.0])?.into())?;
        let t = obs.sample(&[1, 0])?.into_tensor()?;
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.to_vec2::<f32>()?, vec![vec![4.0, 5.0, 6.0], vec![1.0, 2.0, 3.0]]);

        let mut act = TensorBatch::new(4);
        act.push(0, ClassicAct::discrete(1)?.into())?;
        let t = act.sample(&[0, 0])?.into_tensor()?;
        assert_eq!(t.dtype(), DType::I64);
        assert_eq!(t.to_vec1::<i64>()?, vec![1, 1]);
        Ok(())
    }

    #[test]
    fn test_action_conversion() -> Result<()> {
        let a: ClassicAct = Tensor::new(&[1u32], &Device::Cpu)?.into();
        assert_eq!(a.to_discrete()?, 1);
        let a = ClassicAct::continuous(&[0.5])?;
        assert_eq!(a.to_continuous()?, vec![0.5]);
        Ok(())
    }
}

use anyhow::{bail, Context, Result};
use candle_core::{Device, IndexOp, Tensor};
use rltf_core::generic_replay_buffer::BatchBase;

/// A buffer consisting of a [`Tensor`].
///
/// The first axis is the batch axis. The internal tensor is allocated on
/// the first push, with the shape `[capacity, data.dims()[1..]]`, on the CPU.
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Wraps a tensor of which first axis is the batch axis.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims().first().copied().unwrap_or(0);
        Self {
            buf: Some(t),
            capacity,
        }
    }

    /// Returns the internal tensor.
    pub fn into_tensor(self) -> Result<Tensor> {
        self.buf.context("TensorBatch is empty")
    }

    /// Moves the internal tensor to the device.
    pub fn to(&mut self, device: &Device) -> Result<()> {
        if let Some(buf) = &self.buf {
            self.buf = Some(buf.to_device(device)?);
        }
        Ok(())
    }
}

impl From<Tensor> for TensorBatch {
    fn from(t: Tensor) -> Self {
        Self::from_tensor(t)
    }
}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    /// Pushes given data.
    ///
    /// Data beyond the end of the buffer is written from its beginning.
    fn push(&mut self, index: usize, data: Self) -> Result<()> {
        let data = match data.buf {
            Some(data) => data.to_device(&Device::Cpu)?,
            None => return Ok(()),
        };

        let batch_size = data.dims()[0];
        if batch_size == 0 {
            return Ok(());
        }
        if batch_size > self.capacity {
            bail!("Batch of {} exceeds the capacity {}", batch_size, self.capacity);
        }

        if self.buf.is_none() {
            let mut shape = data.dims().to_vec();
            shape[0] = self.capacity;
            self.buf = Some(Tensor::zeros(shape, data.dtype(), &Device::Cpu)?);
        }
        let buf = self.buf.as_ref().context("Buffer is not allocated")?;

        if index + batch_size > self.capacity {
            let n = self.capacity - index;
            buf.slice_set(&data.i(..n)?.contiguous()?, 0, index)?;
            buf.slice_set(&data.i(n..)?.contiguous()?, 0, 0)?;
        } else {
            buf.slice_set(&data.contiguous()?, 0, index)?;
        }

        Ok(())
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        let buf = self.buf.as_ref().context("Sampling from an empty TensorBatch")?;
        let capacity = ixs.len();
        let ixs = {
            let ixs = ixs.iter().map(|x| *x as u32).collect::<Vec<_>>();
            Tensor::from_vec(ixs, &[capacity], buf.device())?
        };
        let buf = Some(buf.index_select(&ixs, 0)?);
        Ok(Self { buf, capacity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_push_wraps_around() -> Result<()> {
        let mut batch = TensorBatch::new(3);
        let data = |vs: &[f32]| -> Result<TensorBatch> {
            Ok(Tensor::from_slice(vs, (vs.len(), 1), &Device::Cpu)?.into())
        };

        batch.push(0, data(&[1.0, 2.0])?)?;
        batch.push(2, data(&[3.0, 4.0])?)?;

        let t = batch.sample(&[0, 1, 2])?.into_tensor()?;
        assert_eq!(t.dims(), &[3, 1]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.flatten_all()?.to_vec1::<f32>()?, vec![4.0, 2.0, 3.0]);
        Ok(())
    }
}

use super::{mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let dims = std::iter::once(config.in_dim)
        .chain(config.units.iter().copied())
        .chain(std::iter::once(config.out_dim))
        .collect::<Vec<_>>();
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| linear(w[0], w[1], vs.pp(format!("ln{}", i))).map_err(anyhow::Error::from))
        .collect()
}

/// Multilayer perceptron with ReLU activation function.
///
/// As [`SubModel2`], the two inputs are concatenated along the last axis.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl Mlp {
    fn _build(vs: VarBuilder, config: MlpConfig) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let xs = xs.to_device(&self.device)?;
        mlp_forward(xs, &self.layers, &self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        Self::_build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Tensor> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        mlp_forward(input, &self.layers, &self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        Self::_build(vs, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Activation;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_mlp_shapes() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(4, vec![8, 8], 2, Activation::Tanh);
        let mlp = <Mlp as SubModel1>::build(vb, config)?;

        let xs = Tensor::zeros((3, 4), DType::F32, &Device::Cpu)?;
        let ys = SubModel1::forward(&mlp, &xs)?;
        assert_eq!(ys.dims(), &[3, 2]);
        assert_eq!(varmap.all_vars().len(), 6);

        let a = Tensor::zeros((3, 3), DType::F32, &Device::Cpu)?;
        let b = Tensor::zeros((3, 1), DType::F32, &Device::Cpu)?;
        let ys = SubModel2::forward(&mlp, &a, &b)?;
        assert!(ys.abs()?.max_keepdim(1)?.flatten_all()?.to_vec1::<f32>()?.iter().all(|&v| v <= 1.0));
        Ok(())
    }
}

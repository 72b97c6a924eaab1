//! Action-value network shared by value-based agents.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`ValueModel`].
///
/// The output dimension of `q_config` is the number of actions. Agents whose
/// networks output more than one value per action widen it when building the model.
pub struct ValueModelConfig<Q> {
    pub(crate) q_config: Option<Q>,
    pub(crate) opt_config: OptimizerConfig,
}

impl<Q> Default for ValueModelConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<Q> ValueModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(q_config) = &mut self.q_config {
            q_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// The output dimension of `q_config`.
    pub fn get_out_dim(&self) -> Result<usize> {
        Ok(self
            .q_config
            .as_ref()
            .context("q_config is not set.")?
            .get_out_dim())
    }

    /// Constructs [`ValueModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ValueModelConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A network with its variables and optimizer.
pub struct ValueModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    out_dim: usize,
    q: Q,
    opt: Optimizer,
}

impl<Q> ValueModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`ValueModel`].
    pub fn build(config: ValueModelConfig<Q::Config>, device: &Device) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let out_dim = q_config.get_out_dim();
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            Q::build(vb, q_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            out_dim,
            q,
            opt,
        })
    }

    /// Output dimension of the network.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Outputs the values given observations.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        self.q.forward(obs)
    }

    /// Updates the parameters with the gradient of `loss`.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variables of the network.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters in safetensors format.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save value model to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load value model from {:?}", path.as_ref());
        Ok(())
    }
}

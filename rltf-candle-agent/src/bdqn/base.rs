//! BDQN agent implemented with candle.
use super::{BdqnConfig, BdqnPolicy};
use crate::{
    blr::{Blr, BlrConfig},
    ids::ids_action,
    model::SubModel1,
    util::{argmax, track, weighted_mean, CriticLoss, OutDim, TransitionTensors},
    value::ValueModel,
    TensorTransitionBatch,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use log::{debug, info};
use ndarray::{Array1, Array2};
use rand::{rngs::SmallRng, SeedableRng};
use rltf_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashMap, fs, marker::PhantomData, path::Path};

/// BDQN agent.
///
/// In evaluation mode, actions are greedy on the posterior means.
pub struct Bdqn<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    qnet: ValueModel<Q>,
    qnet_tgt: ValueModel<Q>,
    n_actions: usize,
    feature_dim: usize,
    blr_config: BlrConfig,
    blrs: Vec<Blr>,
    w_mean: Tensor,
    w_sample: Vec<Array1<f64>>,
    blr_update_interval: usize,
    blr_batch_size: usize,
    sample_interval: usize,
    steps_since_sample: usize,
    policy: BdqnPolicy,
    soft_update_interval: usize,
    soft_update_counter: usize,
    batch_size: usize,
    discount_factor: f64,
    tau: f64,
    critic_loss: CriticLoss,
    n_opts: usize,
    train: bool,
    device: Device,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> Bdqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Posterior means as a tensor of the shape `[feature_dim, n_actions]`.
    fn posterior_means(&self) -> Result<Tensor> {
        let w = (0..self.feature_dim)
            .flat_map(|i| self.blrs.iter().map(move |blr| blr.mean()[i] as f32))
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(
            w,
            (self.feature_dim, self.n_actions),
            &self.device,
        )?)
    }

    fn resample_weights(&mut self) {
        let rng = &mut self.rng;
        self.w_sample = self.blrs.iter().map(|blr| blr.sample_weights(&mut *rng)).collect();
        self.steps_since_sample = 0;
        debug!("Resampled weights of the posterior");
    }

    /// Refits the posterior on features of transitions in the buffer.
    fn refit_posterior(&mut self, buffer: &mut R) -> Result<()> {
        let batch = buffer.batch(self.blr_batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;

        let phi = self.qnet.forward(&tr.obs)?.detach().to_vec2::<f32>()?;
        let y = {
            let v_next = self
                .qnet_tgt
                .forward(&tr.next_obs)?
                .matmul(&self.w_mean)?
                .max(D::Minus1)?;
            tr.bellman_target(&v_next)?.to_vec1::<f32>()?
        };
        let act = tr.act.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?;

        for (a, blr) in self.blrs.iter_mut().enumerate() {
            let rows = act
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b as usize == a)
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            let x = Array2::from_shape_fn((rows.len(), self.feature_dim), |(i, j)| {
                phi[rows[i]][j] as f64
            });
            let y = rows.iter().map(|&i| y[i] as f64).collect::<Array1<_>>();
            blr.fit(&x, &y)?;
        }

        self.w_mean = self.posterior_means()?;
        self.resample_weights();
        info!("Refit the posterior on {} transitions", act.len());
        Ok(())
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;

        let pred = self
            .qnet
            .forward(&tr.obs)?
            .matmul(&self.w_mean)?
            .gather(&tr.act_ixs()?, D::Minus1)?
            .squeeze(D::Minus1)?;
        let tgt = {
            let v_next = self
                .qnet_tgt
                .forward(&tr.next_obs)?
                .matmul(&self.w_mean)?
                .max(D::Minus1)?;
            tr.bellman_target(&v_next)?
        };
        let loss = self.critic_loss.elementwise(&pred, &tgt)?;
        let loss = weighted_mean(&loss, tr.weight.as_ref())?;
        self.qnet.backward_step(&loss)?;

        if tr.weight.is_some() {
            let td_errs = (&pred - &tgt)?.abs()?.to_vec1::<f32>()?;
            buffer.update_priority(&tr.ixs, &Some(td_errs));
        }

        Ok(loss.to_scalar::<f32>()?)
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        if self.n_opts % self.blr_update_interval == 0 {
            self.refit_posterior(buffer)?;
        }

        let loss_critic = self.update_critic(buffer)?;

        self.soft_update_counter += 1;
        if self.soft_update_counter == self.soft_update_interval {
            self.soft_update_counter = 0;
            track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)?;
        }

        self.n_opts += 1;

        Ok(Record::from_slice(&[(
            "loss_critic",
            RecordValue::Scalar(loss_critic),
        )]))
    }

    fn action(&self, phi: &[f32]) -> usize {
        let x = phi.iter().map(|&v| v as f64).collect::<Array1<_>>();
        let mean = self
            .blrs
            .iter()
            .map(|blr| blr.predict(x.view()) as f32)
            .collect::<Vec<_>>();

        if !self.train {
            return argmax(&mean);
        }

        let stds = || {
            self.blrs
                .iter()
                .map(|blr| blr.predictive_var(x.view()).sqrt() as f32)
                .collect::<Vec<_>>()
        };
        match &self.policy {
            BdqnPolicy::Thompson => {
                let q = self
                    .w_sample
                    .iter()
                    .map(|w| w.dot(&x) as f32)
                    .collect::<Vec<_>>();
                argmax(&q)
            }
            BdqnPolicy::Ucb { kappa } => {
                let ucb = mean
                    .iter()
                    .zip(stds().iter())
                    .map(|(m, s)| m + kappa * s)
                    .collect::<Vec<_>>();
                argmax(&ucb)
            }
            BdqnPolicy::Ids { n_stds } => {
                let rho2 = vec![self.blr_config.noise_var as f32; self.n_actions];
                ids_action(&mean, &stds(), &rho2, *n_stds)
            }
        }
    }

    /// Posterior of each action.
    pub fn posterior(&self) -> &[Blr] {
        &self.blrs
    }
}

impl<E, Q, R> Policy<E> for Bdqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        if self.train {
            self.steps_since_sample += 1;
            if self.steps_since_sample >= self.sample_interval {
                self.resample_weights();
            }
        }

        let obs: Tensor = obs.clone().into();
        let phi = self
            .qnet
            .forward(&obs.to_device(&self.device)?)?
            .to_vec2::<f32>()?;
        let acts = phi
            .iter()
            .map(|phi| self.action(phi) as i64)
            .collect::<Vec<_>>();
        let n = acts.len();
        Ok(Tensor::from_vec(acts, (n,), &self.device)?.into())
    }

    fn reset(&mut self) {
        self.resample_weights();
    }
}

impl<E, Q, R> Configurable for Bdqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = BdqnConfig<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let feature_dim = config.model_config.get_out_dim()?;
        let n_actions = config.n_actions;
        let qnet = ValueModel::build(config.model_config.clone(), &device)?;
        let qnet_tgt = ValueModel::build(config.model_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        let blr_config = &config.blr_config;
        let blrs = (0..n_actions)
            .map(|_| Blr::new(feature_dim, blr_config.clone()))
            .collect::<Vec<_>>();
        let w_sample = blrs.iter().map(|blr| blr.mean().clone()).collect();

        let mut bdqn = Self {
            qnet,
            qnet_tgt,
            n_actions,
            feature_dim,
            blr_config: config.blr_config,
            blrs,
            w_mean: Tensor::zeros((feature_dim, n_actions), DType::F32, &device)?,
            w_sample,
            blr_update_interval: config.blr_update_interval.max(1),
            blr_batch_size: config.blr_batch_size,
            sample_interval: config.sample_interval.max(1),
            steps_since_sample: 0,
            policy: config.policy,
            soft_update_interval: config.soft_update_interval,
            soft_update_counter: 0,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            critic_loss: config.critic_loss,
            n_opts: 0,
            train: false,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        };
        bdqn.resample_weights();
        Ok(bdqn)
    }
}

impl<E, Q, R> Agent<E, R> for Bdqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Record> {
        self.opt_(buffer)
    }

    /// Saves the feature networks and the posterior of the regressions.
    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(path.join("qnet.safetensors"))?;
        self.qnet_tgt.save(path.join("qnet_tgt.safetensors"))?;

        let (n, d) = (self.n_actions, self.feature_dim);
        let mean = self
            .blrs
            .iter()
            .flat_map(|blr| blr.mean().iter().copied().collect::<Vec<_>>())
            .collect::<Vec<f64>>();
        let precision = self
            .blrs
            .iter()
            .flat_map(|blr| blr.precision().iter().copied().collect::<Vec<_>>())
            .collect::<Vec<f64>>();
        let tensors = HashMap::from([
            (
                "blr_mean".to_string(),
                Tensor::from_vec(mean, (n, d), &candle_core::Device::Cpu)?,
            ),
            (
                "blr_precision".to_string(),
                Tensor::from_vec(precision, (n, d, d), &candle_core::Device::Cpu)?,
            ),
        ]);
        candle_core::safetensors::save(&tensors, path.join("blr.safetensors"))?;
        info!("Save posterior to {:?}", path.join("blr.safetensors"));
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join("qnet.safetensors"))?;
        self.qnet_tgt.load(path.join("qnet_tgt.safetensors"))?;

        let tensors =
            candle_core::safetensors::load(path.join("blr.safetensors"), &candle_core::Device::Cpu)?;
        let mean = tensors
            .get("blr_mean")
            .context("blr_mean is not in the file")?
            .to_vec2::<f64>()?;
        let precision = tensors
            .get("blr_precision")
            .context("blr_precision is not in the file")?
            .to_vec3::<f64>()?;
        let d = self.feature_dim;

        self.blrs = mean
            .into_iter()
            .zip(precision.into_iter())
            .map(|(m, p)| {
                let p = Array2::from_shape_vec((d, d), p.into_iter().flatten().collect())?;
                Blr::from_posterior(Array1::from(m), p, self.blr_config.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        self.w_mean = self.posterior_means()?;
        self.resample_weights();
        info!("Load posterior from {:?}", path.join("blr.safetensors"));
        Ok(())
    }
}

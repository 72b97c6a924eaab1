//! QR-DQN agent implemented with candle.
use super::{QrDqnConfig, QrDqnPolicy};
use crate::{
    dqn::random_actions,
    model::SubModel1,
    util::{
        argmax, gather_actions, greedy, quantile_midpoints, quantile_regression_loss, track,
        weighted_mean, OutDim, TransitionTensors,
    },
    value::ValueModel,
    TensorTransitionBatch,
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rltf_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

/// QR-DQN agent.
///
/// With [`QrDqnPolicy::ThompsonSampling`], an action in training mode is
/// greedy on one quantile drawn uniformly for each action.
pub struct QrDqn<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    qnet: ValueModel<Q>,
    qnet_tgt: ValueModel<Q>,
    n_actions: usize,
    n_quantiles: usize,
    tau_levels: Tensor,
    kappa: f64,
    soft_update_interval: usize,
    soft_update_counter: usize,
    n_updates_per_opt: usize,
    batch_size: usize,
    discount_factor: f64,
    tau: f64,
    policy: QrDqnPolicy,
    eps_eval: f64,
    train: bool,
    device: Device,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Quantiles of the shape `[batch_size, n_actions, n_quantiles]`.
    fn quantiles(&self, model: &ValueModel<Q>, obs: &Tensor) -> Result<Tensor> {
        let theta = model.forward(obs)?;
        let batch_size = theta.dims()[0];
        Ok(theta.reshape((batch_size, self.n_actions, self.n_quantiles))?)
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;

        let tgt = {
            let theta_next = self.quantiles(&self.qnet_tgt, &tr.next_obs)?;
            let a_next = theta_next.mean(D::Minus1)?.argmax_keepdim(D::Minus1)?;
            tr.bellman_target(&gather_actions(&theta_next, &a_next)?)?
        };
        let theta = gather_actions(&self.quantiles(&self.qnet, &tr.obs)?, &tr.act)?;
        let loss = quantile_regression_loss(&theta, &tgt, &self.tau_levels, self.kappa)?;
        let loss_mean = weighted_mean(&loss, tr.weight.as_ref())?;
        self.qnet.backward_step(&loss_mean)?;

        if tr.weight.is_some() {
            buffer.update_priority(&tr.ixs, &Some(loss.to_vec1::<f32>()?));
        }

        Ok(loss_mean.to_scalar::<f32>()?)
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let mut loss_critic = 0f32;

        for _ in 0..self.n_updates_per_opt {
            loss_critic += self.update_critic(buffer)?;
        }

        self.soft_update_counter += 1;
        if self.soft_update_counter == self.soft_update_interval {
            self.soft_update_counter = 0;
            track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)?;
        }

        loss_critic /= self.n_updates_per_opt as f32;

        Ok(Record::from_slice(&[(
            "loss_critic",
            RecordValue::Scalar(loss_critic),
        )]))
    }

    fn thompson_sampling(&mut self, theta: &Tensor) -> Result<Tensor> {
        let theta = theta.to_vec3::<f32>()?;
        let n_quantiles = self.n_quantiles;
        let rng = &mut self.rng;
        let acts = theta
            .iter()
            .map(|qs| {
                let sampled = qs
                    .iter()
                    .map(|q| q[rng.gen_range(0..n_quantiles)])
                    .collect::<Vec<_>>();
                argmax(&sampled) as i64
            })
            .collect::<Vec<_>>();
        let n = acts.len();
        Ok(Tensor::from_vec(acts, (n,), &self.device)?)
    }
}

impl<E, Q, R> Policy<E> for QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        let obs: Tensor = obs.clone().into();
        let theta = self.quantiles(&self.qnet, &obs.to_device(&self.device)?)?;
        let q = theta.mean(D::Minus1)?;

        let a = if self.train {
            match &mut self.policy {
                QrDqnPolicy::Greedy(explorer) => explorer.action(&q, &mut self.rng)?,
                QrDqnPolicy::ThompsonSampling => self.thompson_sampling(&theta)?,
            }
        } else if self.rng.gen::<f64>() < self.eps_eval {
            random_actions(&q, &mut self.rng)?
        } else {
            greedy(&q)?
        };
        Ok(a.into())
    }
}

impl<E, Q, R> Configurable for QrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = QrDqnConfig<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let n_actions = config.model_config.get_out_dim()?;
        let n_quantiles = config.n_quantiles;
        let model_config = config.model_config.out_dim(n_actions * n_quantiles);
        let qnet = ValueModel::build(model_config.clone(), &device)?;
        let qnet_tgt = ValueModel::build(model_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Self {
            qnet,
            qnet_tgt,
            n_actions,
            n_quantiles,
            tau_levels: quantile_midpoints(n_quantiles, &device)?,
            kappa: config.kappa,
            soft_update_interval: config.soft_update_interval,
            soft_update_counter: 0,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            policy: config.policy,
            eps_eval: config.eps_eval,
            train: false,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<E, Q, R> Agent<E, R> for QrDqn<E, Q, R>
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

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(path.join("qnet.safetensors"))?;
        self.qnet_tgt.save(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join("qnet.safetensors"))?;
        self.qnet_tgt.load(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }
}

//! C51 agent implemented with candle.
use super::{categorical_projection, C51Config};
use crate::{
    dqn::{random_actions, DqnExplorer},
    model::SubModel1,
    util::{gather_actions, greedy, track, weighted_mean, OutDim, TransitionTensors},
    value::ValueModel,
    TensorTransitionBatch,
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::ops::{log_softmax, softmax};
use log::info;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rltf_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

/// Logits of the shape `[batch_size, n_actions, n_atoms]`.
fn dist_logits<Q>(model: &ValueModel<Q>, obs: &Tensor, n_actions: usize, n_atoms: usize) -> Result<Tensor>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    let logits = model.forward(obs)?;
    let batch_size = logits.dims()[0];
    Ok(logits.reshape((batch_size, n_actions, n_atoms))?)
}

/// C51 agent.
pub struct C51<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    qnet: ValueModel<Q>,
    qnet_tgt: ValueModel<Q>,
    n_actions: usize,
    n_atoms: usize,
    v_min: f32,
    v_max: f32,
    support: Tensor,
    soft_update_interval: usize,
    soft_update_counter: usize,
    n_updates_per_opt: usize,
    batch_size: usize,
    discount_factor: f64,
    tau: f64,
    explorer: DqnExplorer,
    eps_eval: f64,
    train: bool,
    device: Device,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> C51<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Expected action values of the shape `[batch_size, n_actions]` given probabilities of atoms.
    fn expected_q(&self, p: &Tensor) -> Result<Tensor> {
        let z = self.support.reshape((1, 1, self.n_atoms))?;
        Ok(p.broadcast_mul(&z)?.sum(D::Minus1)?)
    }

    /// Projected target distributions of the shape `[batch_size, n_atoms]`.
    fn target_dist(&self, tr: &TransitionTensors) -> Result<Tensor> {
        let logits = dist_logits(&self.qnet_tgt, &tr.next_obs, self.n_actions, self.n_atoms)?;
        let p_next = softmax(&logits, D::Minus1)?;
        let a_next = self.expected_q(&p_next)?.argmax_keepdim(D::Minus1)?;
        let p_next = gather_actions(&p_next, &a_next)?.to_vec2::<f32>()?;
        let reward = tr.reward.to_vec1::<f32>()?;
        let discount = tr.discount.to_vec1::<f32>()?;
        let (v_min, v_max) = (self.v_min, self.v_max);

        let m = p_next
            .iter()
            .zip(reward.iter().zip(discount.iter()))
            .flat_map(|(p, (&r, &d))| categorical_projection(p, r, d, v_min, v_max))
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(m, (tr.batch_size(), self.n_atoms), &self.device)?)
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;

        let m = self.target_dist(&tr)?;
        let log_p = {
            let logits = dist_logits(&self.qnet, &tr.obs, self.n_actions, self.n_atoms)?;
            gather_actions(&log_softmax(&logits, D::Minus1)?, &tr.act)?
        };
        let cross_entropy = (m * log_p)?.sum(D::Minus1)?.neg()?;
        let loss = weighted_mean(&cross_entropy, tr.weight.as_ref())?;
        self.qnet.backward_step(&loss)?;

        if tr.weight.is_some() {
            let priorities = cross_entropy.to_vec1::<f32>()?;
            buffer.update_priority(&tr.ixs, &Some(priorities));
        }

        Ok(loss.to_scalar::<f32>()?)
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
}

impl<E, Q, R> Policy<E> for C51<E, Q, R>
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
        let logits = dist_logits(
            &self.qnet,
            &obs.to_device(&self.device)?,
            self.n_actions,
            self.n_atoms,
        )?;
        let q = self.expected_q(&softmax(&logits, D::Minus1)?)?;
        let a = if self.train {
            self.explorer.action(&q, &mut self.rng)?
        } else if self.rng.gen::<f64>() < self.eps_eval {
            random_actions(&q, &mut self.rng)?
        } else {
            greedy(&q)?
        };
        Ok(a.into())
    }
}

impl<E, Q, R> Configurable for C51<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = C51Config<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let n_actions = config.model_config.get_out_dim()?;
        let n_atoms = config.n_atoms;
        let model_config = config.model_config.out_dim(n_actions * n_atoms);
        let qnet = ValueModel::build(model_config.clone(), &device)?;
        let qnet_tgt = ValueModel::build(model_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        let support = {
            let dz = (config.v_max - config.v_min) / (n_atoms.max(2) - 1) as f32;
            let v_min = config.v_min;
            let z = (0..n_atoms)
                .map(|j| v_min + dz * j as f32)
                .collect::<Vec<_>>();
            Tensor::from_vec(z, (n_atoms,), &device)?
        };
        info!(
            "C51 with {} actions, {} atoms in [{}, {}]",
            n_actions, n_atoms, config.v_min, config.v_max
        );

        Ok(Self {
            qnet,
            qnet_tgt,
            n_actions,
            n_atoms,
            v_min: config.v_min,
            v_max: config.v_max,
            support,
            soft_update_interval: config.soft_update_interval,
            soft_update_counter: 0,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            explorer: config.explorer,
            eps_eval: config.eps_eval,
            train: false,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<E, Q, R> Agent<E, R> for C51<E, Q, R>
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

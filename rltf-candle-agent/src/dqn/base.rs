//! DQN agent implemented with candle.
use super::{config::DqnConfig, explorer::DqnExplorer, random_actions};
use crate::{
    model::SubModel1,
    util::{greedy, track, weighted_mean, OutDim, TransitionTensors},
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

#[allow(clippy::upper_case_acronyms)]
/// DQN agent implemented with candle.
///
/// The output dimension of the action-value network is the number of actions.
/// Actions are `i64` tensors of the shape `[1]`.
pub struct Dqn<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    pub(in crate::dqn) soft_update_interval: usize,
    pub(in crate::dqn) soft_update_counter: usize,
    pub(in crate::dqn) n_updates_per_opt: usize,
    pub(in crate::dqn) batch_size: usize,
    pub(in crate::dqn) qnet: ValueModel<Q>,
    pub(in crate::dqn) qnet_tgt: ValueModel<Q>,
    pub(in crate::dqn) train: bool,
    pub(in crate::dqn) discount_factor: f64,
    pub(in crate::dqn) tau: f64,
    pub(in crate::dqn) explorer: DqnExplorer,
    pub(in crate::dqn) double_dqn: bool,
    pub(in crate::dqn) critic_loss: crate::util::CriticLoss,
    pub(in crate::dqn) eps_eval: f64,
    pub(in crate::dqn) device: Device,
    pub(in crate::dqn) n_opts: usize,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Target action values of the shape `[batch_size]`.
    fn target_q(&self, next_obs: &Tensor) -> Result<Tensor> {
        let q_tgt = self.qnet_tgt.forward(next_obs)?;
        let q = if self.double_dqn {
            let a = self.qnet.forward(next_obs)?.argmax_keepdim(D::Minus1)?;
            q_tgt.gather(&a, D::Minus1)?.squeeze(D::Minus1)?
        } else {
            q_tgt.max(D::Minus1)?
        };
        Ok(q.detach())
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;

        let pred = self
            .qnet
            .forward(&tr.obs)?
            .gather(&tr.act_ixs()?, D::Minus1)?
            .squeeze(D::Minus1)?;
        let tgt = tr.bellman_target(&self.target_q(&tr.next_obs)?)?;
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
        self.n_opts += 1;

        let mut record =
            Record::from_slice(&[("loss_critic", RecordValue::Scalar(loss_critic))]);
        if let DqnExplorer::EpsilonGreedy(egreedy) = &self.explorer {
            record.insert("eps", RecordValue::Scalar(egreedy.eps() as f32));
        }
        Ok(record)
    }

    /// The number of optimization steps so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }
}

impl<E, Q, R> Policy<E> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// In evaluation mode, takes a random action with probability `eps_eval`.
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        let obs: Tensor = obs.clone().into();
        let q = self.qnet.forward(&obs.to_device(&self.device)?)?;
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

impl<E, Q, R> Configurable for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = DqnConfig<Q::Config>;

    /// Constructs DQN agent.
    ///
    /// The target network starts with the parameters of the online network.
    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let qnet = ValueModel::build(config.model_config.clone(), &device)?;
        let qnet_tgt = ValueModel::build(config.model_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Dqn {
            qnet,
            qnet_tgt,
            soft_update_interval: config.soft_update_interval,
            soft_update_counter: 0,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            train: false,
            explorer: config.explorer,
            double_dqn: config.double_dqn,
            critic_loss: config.critic_loss,
            eps_eval: config.eps_eval,
            device,
            n_opts: 0,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<E, Q, R> Agent<E, R> for Dqn<E, Q, R>
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

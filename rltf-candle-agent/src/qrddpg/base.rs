//! QR-DDPG agent implemented with candle.
use super::QrDdpgConfig;
use crate::{
    ddpg::{ActionNoise, Actor, Critic},
    model::{SubModel1, SubModel2},
    util::{quantile_midpoints, quantile_regression_loss, track, weighted_mean, OutDim, TransitionTensors},
    TensorTransitionBatch,
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use rand::{rngs::SmallRng, SeedableRng};
use rltf_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

/// QR-DDPG agent.
pub struct QrDdpg<E, P, Q, R>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    actor: Actor<P>,
    actor_tgt: Actor<P>,
    critic: Critic<Q>,
    critic_tgt: Critic<Q>,
    noise: ActionNoise,
    tau_levels: Tensor,
    kappa: f64,
    n_updates_per_opt: usize,
    batch_size: usize,
    discount_factor: f64,
    tau: f64,
    train: bool,
    device: Device,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, P, Q, R> QrDdpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn update_critic(&mut self, tr: &TransitionTensors, buffer: &mut R) -> Result<f32> {
        let tgt = {
            let a_next = self.actor_tgt.forward(&tr.next_obs)?;
            tr.bellman_target(&self.critic_tgt.forward(&tr.next_obs, &a_next)?)?
        };
        let theta = self.critic.forward(&tr.obs, &tr.act)?;
        let loss = quantile_regression_loss(&theta, &tgt, &self.tau_levels, self.kappa)?;
        let loss_mean = weighted_mean(&loss, tr.weight.as_ref())?;
        self.critic.backward_step(&loss_mean)?;

        if tr.weight.is_some() {
            buffer.update_priority(&tr.ixs, &Some(loss.to_vec1::<f32>()?));
        }

        Ok(loss_mean.to_scalar::<f32>()?)
    }

    fn update_actor(&mut self, tr: &TransitionTensors) -> Result<f32> {
        let act = self.actor.forward(&tr.obs)?;
        let loss = self
            .critic
            .forward(&tr.obs, &act)?
            .mean(D::Minus1)?
            .mean_all()?
            .neg()?;
        self.actor.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let mut loss_critic = 0f32;
        let mut loss_actor = 0f32;

        for _ in 0..self.n_updates_per_opt {
            let batch = buffer.batch(self.batch_size)?;
            let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;
            loss_critic += self.update_critic(&tr, buffer)?;
            loss_actor += self.update_actor(&tr)?;
            track(self.critic_tgt.get_varmap(), self.critic.get_varmap(), self.tau)?;
            track(self.actor_tgt.get_varmap(), self.actor.get_varmap(), self.tau)?;
        }

        let n = self.n_updates_per_opt as f32;
        Ok(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic / n)),
            ("loss_actor", RecordValue::Scalar(loss_actor / n)),
        ]))
    }
}

impl<E, P, Q, R> Policy<E> for QrDdpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        let obs: Tensor = obs.clone().into();
        let a = self.actor.forward(&obs.to_device(&self.device)?)?.detach();
        let a = match self.train {
            true => {
                let n = self.noise.sample(&mut self.rng);
                let n = Tensor::from_vec(n, (1, self.actor.out_dim()), &self.device)?;
                a.broadcast_add(&n)?.clamp(-1f32, 1f32)?
            }
            false => a,
        };
        Ok(a.into())
    }

    fn reset(&mut self) {
        self.noise.reset();
    }
}

impl<E, P, Q, R> Configurable for QrDdpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = QrDdpgConfig<P::Config, Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let critic_config = config.critic_config.out_dim(config.n_quantiles);
        let actor = Actor::build(config.actor_config.clone(), &device)?;
        let actor_tgt = Actor::build(config.actor_config, &device)?;
        let critic = Critic::build(critic_config.clone(), &device)?;
        let critic_tgt = Critic::build(critic_config, &device)?;
        track(actor_tgt.get_varmap(), actor.get_varmap(), 1.0)?;
        track(critic_tgt.get_varmap(), critic.get_varmap(), 1.0)?;
        let noise = ActionNoise::new(config.action_noise, actor.out_dim());

        Ok(Self {
            actor,
            actor_tgt,
            critic,
            critic_tgt,
            noise,
            tau_levels: quantile_midpoints(config.n_quantiles, &device)?,
            kappa: config.kappa,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            train: false,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<E, P, Q, R> Agent<E, R> for QrDdpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
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
        self.actor.save(path.join("actor.safetensors"))?;
        self.actor_tgt.save(path.join("actor_tgt.safetensors"))?;
        self.critic.save(path.join("critic.safetensors"))?;
        self.critic_tgt.save(path.join("critic_tgt.safetensors"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.actor.load(path.join("actor.safetensors"))?;
        self.actor_tgt.load(path.join("actor_tgt.safetensors"))?;
        self.critic.load(path.join("critic.safetensors"))?;
        self.critic_tgt.load(path.join("critic_tgt.safetensors"))?;
        Ok(())
    }
}

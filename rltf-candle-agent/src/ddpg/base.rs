//! DDPG agent implemented with candle.
use super::{ActionNoise, Actor, Critic, DdpgConfig};
use crate::{
    model::{SubModel1, SubModel2},
    util::{track, weighted_mean, CriticLoss, OutDim, TransitionTensors},
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

#[allow(clippy::upper_case_acronyms)]
/// DDPG agent.
///
/// Actions are tensors of the shape `[1, act_dim]` in `[-1, 1]`. In training mode,
/// noise is added to the actions of the actor and the result is clipped.
pub struct Ddpg<E, P, Q, R>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    actor: Actor<P>,
    actor_tgt: Actor<P>,
    critic: Critic<Q>,
    critic_tgt: Critic<Q>,
    noise: ActionNoise,
    n_updates_per_opt: usize,
    batch_size: usize,
    discount_factor: f64,
    tau: f64,
    critic_loss: CriticLoss,
    train: bool,
    device: Device,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, P, Q, R> Ddpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    fn update_critic(&mut self, tr: &TransitionTensors, buffer: &mut R) -> Result<f32> {
        let tgt = {
            let a_next = self.actor_tgt.forward(&tr.next_obs)?;
            let q_next = self
                .critic_tgt
                .forward(&tr.next_obs, &a_next)?
                .squeeze(D::Minus1)?;
            tr.bellman_target(&q_next)?
        };
        let pred = self.critic.forward(&tr.obs, &tr.act)?.squeeze(D::Minus1)?;
        let loss = self.critic_loss.elementwise(&pred, &tgt)?;
        let loss = weighted_mean(&loss, tr.weight.as_ref())?;
        self.critic.backward_step(&loss)?;

        if tr.weight.is_some() {
            let td_errs = (&pred - &tgt)?.abs()?.to_vec1::<f32>()?;
            buffer.update_priority(&tr.ixs, &Some(td_errs));
        }

        Ok(loss.to_scalar::<f32>()?)
    }

    fn update_actor(&mut self, tr: &TransitionTensors) -> Result<f32> {
        let act = self.actor.forward(&tr.obs)?;
        let loss = self.critic.forward(&tr.obs, &act)?.mean_all()?.neg()?;
        self.actor.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn soft_update(&mut self) -> Result<()> {
        track(self.critic_tgt.get_varmap(), self.critic.get_varmap(), self.tau)?;
        track(self.actor_tgt.get_varmap(), self.actor.get_varmap(), self.tau)?;
        Ok(())
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let mut loss_critic = 0f32;
        let mut loss_actor = 0f32;

        for _ in 0..self.n_updates_per_opt {
            let batch = buffer.batch(self.batch_size)?;
            let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;
            loss_critic += self.update_critic(&tr, buffer)?;
            loss_actor += self.update_actor(&tr)?;
            self.soft_update()?;
        }

        let n = self.n_updates_per_opt as f32;
        Ok(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic / n)),
            ("loss_actor", RecordValue::Scalar(loss_actor / n)),
        ]))
    }
}

impl<E, P, Q, R> Policy<E> for Ddpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + Clone,
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

impl<E, P, Q, R> Configurable for Ddpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    type Config = DdpgConfig<P::Config, Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let actor = Actor::build(config.actor_config.clone(), &device)?;
        let actor_tgt = Actor::build(config.actor_config, &device)?;
        let critic = Critic::build(config.critic_config.clone(), &device)?;
        let critic_tgt = Critic::build(config.critic_config, &device)?;
        track(actor_tgt.get_varmap(), actor.get_varmap(), 1.0)?;
        track(critic_tgt.get_varmap(), critic.get_varmap(), 1.0)?;
        let noise = ActionNoise::new(config.action_noise, actor.out_dim());

        Ok(Self {
            actor,
            actor_tgt,
            critic,
            critic_tgt,
            noise,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            critic_loss: config.critic_loss,
            train: false,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<E, P, Q, R> Agent<E, R> for Ddpg<E, P, Q, R>
where
    E: Env,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    E::Obs: Into<Tensor>,
    E::Act: From<Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q::Config: DeserializeOwned + Serialize + Clone,
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

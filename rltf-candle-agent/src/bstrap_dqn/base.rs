//! Bootstrapped DQN agent implemented with candle.
use super::{majority_vote, BootstrapMask, BstrapDqnConfig, BstrapPolicy};
use crate::{
    model::SubModel1,
    util::{track, weighted_mean, CriticLoss, OutDim, TransitionTensors},
    value::ValueModel,
    TensorTransitionBatch,
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use log::debug;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rltf_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

/// Reshapes the output of the heads into `[batch_size, n_heads, n_actions]`.
pub(crate) fn head_values(out: &Tensor, n_heads: usize, n_actions: usize) -> Result<Tensor> {
    let batch_size = out.dims()[0];
    Ok(out.reshape((batch_size, n_heads, n_actions))?)
}

/// Loss of the heads with per-head double DQN targets.
///
/// `q`, `q_next` and `q_next_tgt` are values of the shape `[batch_size, n_heads, n_actions]`
/// of the online network at `o_t`, the online network at `o_t+1` and the target network
/// at `o_t+1`. `mask` is of the shape `[batch_size, n_heads]`.
///
/// Returns the masked loss averaged over heads and the mean absolute TD error
/// over heads, both of the shape `[batch_size]`.
pub(crate) fn bootstrap_loss(
    q: &Tensor,
    q_next: &Tensor,
    q_next_tgt: &Tensor,
    tr: &TransitionTensors,
    mask: &Tensor,
    critic_loss: &CriticLoss,
) -> Result<(Tensor, Tensor)> {
    let (batch_size, n_heads, _) = q.dims3()?;
    let act = tr
        .act_ixs()?
        .unsqueeze(1)?
        .broadcast_as((batch_size, n_heads, 1))?
        .contiguous()?;
    let pred = q.contiguous()?.gather(&act, 2)?.squeeze(2)?;

    let tgt = {
        let a_next = q_next.argmax_keepdim(2)?;
        let v_next = q_next_tgt.contiguous()?.gather(&a_next, 2)?.squeeze(2)?;
        tr.bellman_target(&v_next)?
    };

    let loss = (critic_loss.elementwise(&pred, &tgt)? * mask)?.mean(1)?;
    let td_err = (&pred - &tgt)?.abs()?.mean(1)?;
    Ok((loss, td_err))
}

/// Bootstrapped DQN agent.
///
/// In evaluation mode, actions are the majority vote of the heads.
pub struct BstrapDqn<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    qnet: ValueModel<Q>,
    qnet_tgt: ValueModel<Q>,
    n_heads: usize,
    n_actions: usize,
    active_head: usize,
    mask: BootstrapMask,
    policy: BstrapPolicy,
    soft_update_interval: usize,
    soft_update_counter: usize,
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

impl<E, Q, R> BstrapDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn heads(&self, model: &ValueModel<Q>, obs: &Tensor) -> Result<Tensor> {
        head_values(&model.forward(obs)?, self.n_heads, self.n_actions)
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;
        let batch_size = tr.batch_size();

        let mask = {
            let m = self
                .mask
                .masks(tr.ixs.as_ref(), batch_size, self.n_heads, &mut self.rng);
            Tensor::from_vec(m, (batch_size, self.n_heads), &self.device)?
        };
        let q = self.heads(&self.qnet, &tr.obs)?;
        let q_next = self.heads(&self.qnet, &tr.next_obs)?.detach();
        let q_next_tgt = self.heads(&self.qnet_tgt, &tr.next_obs)?.detach();
        let (loss, td_err) =
            bootstrap_loss(&q, &q_next, &q_next_tgt, &tr, &mask, &self.critic_loss)?;
        let loss = weighted_mean(&loss, tr.weight.as_ref())?;
        self.qnet.backward_step(&loss)?;

        if tr.weight.is_some() {
            buffer.update_priority(&tr.ixs, &Some(td_err.to_vec1::<f32>()?));
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

        Ok(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic)),
            ("active_head", RecordValue::Scalar(self.active_head as f32)),
        ]))
    }

    /// The head used by [`BstrapPolicy::Bootstrap`] in the current episode.
    pub fn active_head(&self) -> usize {
        self.active_head
    }
}

impl<E, Q, R> Policy<E> for BstrapDqn<E, Q, R>
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
        let q = self
            .heads(&self.qnet, &obs.to_device(&self.device)?)?
            .to_vec3::<f32>()?;
        let acts = q
            .iter()
            .map(|q_heads| match self.train {
                true => self.policy.action(q_heads, self.active_head) as i64,
                false => majority_vote(q_heads) as i64,
            })
            .collect::<Vec<_>>();
        let n = acts.len();
        Ok(Tensor::from_vec(acts, (n,), &self.device)?.into())
    }

    fn reset(&mut self) {
        self.active_head = self.rng.gen_range(0..self.n_heads);
        debug!("Active head: {}", self.active_head);
    }
}

impl<E, Q, R> Configurable for BstrapDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = BstrapDqnConfig<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let n_actions = config.model_config.get_out_dim()?;
        let n_heads = config.n_heads;
        let model_config = config.model_config.out_dim(n_heads * n_actions);
        let qnet = ValueModel::build(model_config.clone(), &device)?;
        let qnet_tgt = ValueModel::build(model_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Self {
            qnet,
            qnet_tgt,
            n_heads,
            n_actions,
            active_head: 0,
            mask: BootstrapMask::new(config.mask_prob, config.seed),
            policy: config.policy,
            soft_update_interval: config.soft_update_interval,
            soft_update_counter: 0,
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

impl<E, Q, R> Agent<E, R> for BstrapDqn<E, Q, R>
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

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_bootstrap_loss_masks_heads() -> Result<()> {
        let dev = Device::Cpu;
        // Two samples, two heads, two actions.
        let q = Tensor::from_slice(&[1.0f32, 0.0, 2.0, 0.0, 0.0, 1.0, 0.0, 3.0], (2, 2, 2), &dev)?;
        let q_next = Tensor::zeros((2, 2, 2), DType::F32, &dev)?;
        let tr = TransitionTensors {
            obs: Tensor::zeros((2, 1), DType::F32, &dev)?,
            act: Tensor::from_slice(&[0i64, 1], (2, 1), &dev)?,
            next_obs: Tensor::zeros((2, 1), DType::F32, &dev)?,
            reward: Tensor::from_slice(&[1.0f32, 1.0], (2,), &dev)?,
            discount: Tensor::from_slice(&[0.0f32, 0.0], (2,), &dev)?,
            ixs: None,
            weight: None,
        };
        let mask = Tensor::from_slice(&[1.0f32, 0.0, 1.0, 1.0], (2, 2), &dev)?;
        let (loss, td_err) =
            bootstrap_loss(&q, &q_next, &q_next, &tr, &mask, &CriticLoss::Mse)?;

        // Sample 0: predictions (1, 2) against 1, the second head masked.
        // Sample 1: predictions (1, 3) against 1.
        assert_eq!(loss.to_vec1::<f32>()?, vec![0.0, 2.0]);
        assert_eq!(td_err.to_vec1::<f32>()?, vec![0.5, 1.0]);
        Ok(())
    }
}

//! Bootstrapped QR-DQN agent implemented with candle.
use super::{BstrapQrDqnConfig, BstrapQrDqnPolicy};
use crate::{
    bstrap_dqn::{bootstrap_loss, head_values, majority_vote, BootstrapMask},
    ids::{ids_action, mean_std},
    model::SubModel1,
    util::{
        argmax, gather_actions, quantile_midpoints, quantile_regression_loss, track,
        weighted_mean, CriticLoss, OutDim, TransitionTensors,
    },
    value::ValueModel,
    TensorTransitionBatch,
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use log::debug;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rltf_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

const MIN_RETURN_VARIANCE: f32 = 0.25;

/// Variance of the quantiles of each action divided by its mean over actions,
/// floored at `0.25`.
///
/// `quantiles[a][i]` is the `i`-th quantile of action `a`.
pub fn normalized_return_variance(quantiles: &[Vec<f32>]) -> Vec<f32> {
    let var = quantiles
        .iter()
        .map(|qs| {
            let n = qs.len().max(1) as f32;
            let m = qs.iter().sum::<f32>() / n;
            qs.iter().map(|q| (q - m).powi(2)).sum::<f32>() / n
        })
        .collect::<Vec<_>>();
    let mean = var.iter().sum::<f32>() / var.len().max(1) as f32;

    var.iter()
        .map(|v| match mean > 0.0 {
            true => (v / mean).max(MIN_RETURN_VARIANCE),
            false => 1.0,
        })
        .collect()
}

/// Bootstrapped QR-DQN agent.
///
/// In evaluation mode, actions are the majority vote of the bootstrap heads.
pub struct BstrapQrDqn<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
{
    qnet: ValueModel<Q>,
    qnet_tgt: ValueModel<Q>,
    n_heads: usize,
    n_actions: usize,
    n_quantiles: usize,
    tau_levels: Tensor,
    kappa: f64,
    active_head: usize,
    mask: BootstrapMask,
    policy: BstrapQrDqnPolicy,
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

impl<E, Q, R> BstrapQrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Values of the heads `[batch_size, n_heads, n_actions]` and
    /// quantiles `[batch_size, n_actions, n_quantiles]`.
    fn forward(&self, model: &ValueModel<Q>, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let out = model.forward(obs)?;
        let batch_size = out.dims()[0];
        let n_q = self.n_heads * self.n_actions;
        let q = head_values(&out.narrow(1, 0, n_q)?.contiguous()?, self.n_heads, self.n_actions)?;
        let theta = out
            .narrow(1, n_q, self.n_actions * self.n_quantiles)?
            .contiguous()?
            .reshape((batch_size, self.n_actions, self.n_quantiles))?;
        Ok((q, theta))
    }

    fn update_critic(&mut self, buffer: &mut R) -> Result<(f32, f32)> {
        let batch = buffer.batch(self.batch_size)?;
        let tr = TransitionTensors::from_batch(batch, self.discount_factor, &self.device)?;
        let batch_size = tr.batch_size();

        let mask = {
            let m = self
                .mask
                .masks(tr.ixs.as_ref(), batch_size, self.n_heads, &mut self.rng);
            Tensor::from_vec(m, (batch_size, self.n_heads), &self.device)?
        };
        let (q, theta) = self.forward(&self.qnet, &tr.obs)?;
        let (q_next, _) = self.forward(&self.qnet, &tr.next_obs)?;
        let (q_next_tgt, theta_next_tgt) = self.forward(&self.qnet_tgt, &tr.next_obs)?;

        let (loss_bstrap, td_err) = bootstrap_loss(
            &q,
            &q_next.detach(),
            &q_next_tgt.detach(),
            &tr,
            &mask,
            &self.critic_loss,
        )?;

        let loss_quantile = {
            let theta_next_tgt = theta_next_tgt.detach();
            let a_next = theta_next_tgt.mean(D::Minus1)?.argmax_keepdim(D::Minus1)?;
            let tgt = tr.bellman_target(&gather_actions(&theta_next_tgt, &a_next)?)?;
            let theta = gather_actions(&theta, &tr.act)?;
            quantile_regression_loss(&theta, &tgt, &self.tau_levels, self.kappa)?
        };

        let loss_bstrap = weighted_mean(&loss_bstrap, tr.weight.as_ref())?;
        let loss_quantile = weighted_mean(&loss_quantile, tr.weight.as_ref())?;
        self.qnet.backward_step(&(&loss_bstrap + &loss_quantile)?)?;

        if tr.weight.is_some() {
            buffer.update_priority(&tr.ixs, &Some(td_err.to_vec1::<f32>()?));
        }

        Ok((
            loss_bstrap.to_scalar::<f32>()?,
            loss_quantile.to_scalar::<f32>()?,
        ))
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let mut loss_bstrap = 0f32;
        let mut loss_quantile = 0f32;

        for _ in 0..self.n_updates_per_opt {
            let (l1, l2) = self.update_critic(buffer)?;
            loss_bstrap += l1;
            loss_quantile += l2;
        }

        self.soft_update_counter += 1;
        if self.soft_update_counter == self.soft_update_interval {
            self.soft_update_counter = 0;
            track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)?;
        }

        let n = self.n_updates_per_opt as f32;
        Ok(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_bstrap / n)),
            ("loss_quantile", RecordValue::Scalar(loss_quantile / n)),
        ]))
    }

    fn action(&self, q_heads: &[Vec<f32>], quantiles: &[Vec<f32>]) -> usize {
        if !self.train {
            return majority_vote(q_heads);
        }

        match &self.policy {
            BstrapQrDqnPolicy::Bootstrap => argmax(&q_heads[self.active_head]),
            BstrapQrDqnPolicy::Ids { n_stds } => {
                let (mean, std) = mean_std(q_heads);
                let rho2 = normalized_return_variance(quantiles);
                ids_action(&mean, &std, &rho2, *n_stds)
            }
        }
    }
}

impl<E, Q, R> Policy<E> for BstrapQrDqn<E, Q, R>
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
        let (q, theta) = self.forward(&self.qnet, &obs.to_device(&self.device)?)?;
        let (q, theta) = (q.to_vec3::<f32>()?, theta.to_vec3::<f32>()?);
        let acts = q
            .iter()
            .zip(theta.iter())
            .map(|(q_heads, quantiles)| self.action(q_heads, quantiles) as i64)
            .collect::<Vec<_>>();
        let n = acts.len();
        Ok(Tensor::from_vec(acts, (n,), &self.device)?.into())
    }

    fn reset(&mut self) {
        self.active_head = self.rng.gen_range(0..self.n_heads);
        debug!("Active head: {}", self.active_head);
    }
}

impl<E, Q, R> Configurable for BstrapQrDqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    R: ReplayBufferBase<Batch = TensorTransitionBatch>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    type Config = BstrapQrDqnConfig<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.build()?;
        let n_actions = config.model_config.get_out_dim()?;
        let (n_heads, n_quantiles) = (config.n_heads, config.n_quantiles);
        let model_config = config
            .model_config
            .out_dim(n_heads * n_actions + n_actions * n_quantiles);
        let qnet = ValueModel::build(model_config.clone(), &device)?;
        let qnet_tgt = ValueModel::build(model_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Self {
            qnet,
            qnet_tgt,
            n_heads,
            n_actions,
            n_quantiles,
            tau_levels: quantile_midpoints(n_quantiles, &device)?,
            kappa: config.kappa,
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

impl<E, Q, R> Agent<E, R> for BstrapQrDqn<E, Q, R>
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

    #[test]
    fn test_normalized_return_variance() {
        let rho2 = normalized_return_variance(&[vec![-1.0, 1.0], vec![-3.0, 3.0], vec![0.0, 0.0]]);
        // Variances 1, 9, 0 with mean 10/3.
        assert!((rho2[0] - 0.3).abs() < 1e-6);
        assert!((rho2[1] - 2.7).abs() < 1e-6);
        assert_eq!(rho2[2], 0.25);
        assert_eq!(normalized_return_variance(&[vec![1.0], vec![2.0]]), vec![1.0, 1.0]);
    }
}

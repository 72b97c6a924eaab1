//! Training runs of registered models on classic environments.
//!
//! Discrete-action models are trained on [`CartPole`], continuous-action ones
//! on [`Pendulum`]. A run writes the following in its `log_dir`:
//!
//! * `config.yaml`, the [`RunConfig`] of the run,
//! * `train/` and `eval/`, statistics of training and evaluation episodes
//!   recorded by [`Monitor`]s,
//! * `tensorboard/`, records of the training loop,
//! * `model/`, parameters of the agent saved at evaluation and at the end.
mod config;
use anyhow::{bail, Result};
pub use config::RunConfig;
use log::info;
use rltf_candle_agent::{
    bdqn::{Bdqn, BdqnConfig, BdqnPolicy},
    bstrap_dqn::{BstrapDqn, BstrapDqnConfig, BstrapPolicy},
    bstrap_qrdqn::{BstrapQrDqn, BstrapQrDqnConfig, BstrapQrDqnPolicy},
    c51::{C51Config, C51},
    ddpg::{ActorConfig, CriticConfig, Ddpg, DdpgConfig},
    dqn::{Dqn, DqnConfig, DqnExplorer, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    qrddpg::{QrDdpg, QrDdpgConfig},
    qrdqn::{QrDqn, QrDqnConfig, QrDqnPolicy},
    registry::ModelKind,
    value::ValueModelConfig,
    Activation, TensorBatch,
};
use rltf_classic_env::{CartPole, CartPoleConfig, Pendulum, PendulumConfig};
use rltf_core::{
    generic_replay_buffer::{
        SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
        SimpleStepProcessorConfig,
    },
    monitor::{Monitor, MonitorConfig, MonitorMode, MonitoredEvaluator},
    Agent, Configurable, Env, ReplayBufferBase, StepProcessor, Trainer, TrainerConfig,
};
use rltf_tensorboard::TensorboardRecorder;
use std::fs;

type ReplayBuffer = SimpleReplayBuffer<TensorBatch, TensorBatch>;
type DiscreteEnv = Monitor<CartPole>;
type ContinuousEnv = Monitor<Pendulum>;

const CARTPOLE_OBS_DIM: usize = 4;
const CARTPOLE_N_ACTIONS: usize = 2;
const PENDULUM_OBS_DIM: usize = 3;
const PENDULUM_ACT_DIM: usize = 1;
const BDQN_FEATURE_DIM: usize = 32;

fn opt_config(config: &RunConfig) -> OptimizerConfig {
    OptimizerConfig::default().learning_rate(config.learning_rate)
}

fn value_model_config(config: &RunConfig, out_dim: usize) -> ValueModelConfig<MlpConfig> {
    let mlp_config = MlpConfig::new(
        CARTPOLE_OBS_DIM,
        config.units.clone(),
        out_dim,
        Activation::None,
    );
    ValueModelConfig::default()
        .q_config(mlp_config)
        .opt_config(opt_config(config))
}

fn explorer(config: &RunConfig) -> DqnExplorer {
    EpsilonGreedy::with_final_step(config.max_opts / 2)
}

fn actor_config(config: &RunConfig) -> ActorConfig<MlpConfig> {
    let mlp_config = MlpConfig::new(
        PENDULUM_OBS_DIM,
        config.units.clone(),
        PENDULUM_ACT_DIM,
        Activation::Tanh,
    );
    ActorConfig::default()
        .pi_config(mlp_config)
        .opt_config(opt_config(config))
}

fn critic_config(config: &RunConfig) -> CriticConfig<MlpConfig> {
    let mlp_config = MlpConfig::new(
        PENDULUM_OBS_DIM + PENDULUM_ACT_DIM,
        config.units.clone(),
        1,
        Activation::None,
    );
    CriticConfig::default()
        .q_config(mlp_config)
        .opt_config(opt_config(config))
}

/// Evaluator on a monitored environment, logging its statistics after every run.
fn evaluator<E: Env>(env_config: E::Config, config: &RunConfig) -> Result<MonitoredEvaluator<E>> {
    let eval_config = MonitorConfig::new(
        env_config,
        config.path("eval").to_string_lossy(),
        MonitorMode::Eval,
    );
    MonitoredEvaluator::new(&eval_config, config.seed + 1, config.n_episodes_per_eval)
}

/// Trains `agent` on monitored environments built from `env_config`.
///
/// Returns the best evaluation reward.
fn train_agent<E, A>(agent: &mut A, env_config: E::Config, config: &RunConfig) -> Result<Option<f32>>
where
    E: Env,
    TensorBatch: From<E::Obs> + From<E::Act>,
    A: Agent<Monitor<E>, ReplayBuffer>,
{
    let trainer_config = TrainerConfig::default()
        .max_opts(config.max_opts)
        .warmup_period(config.warmup_period)
        .eval_interval(config.eval_interval)
        .flush_record_interval(config.eval_interval)
        .record_agent_info_interval(config.eval_interval)
        .record_compute_cost_interval(config.eval_interval)
        .save_interval(config.max_opts)
        .model_dir(config.path("model").to_string_lossy());
    let env = {
        let env = E::build(&env_config, config.seed)?;
        Monitor::new(env, config.path("train"), MonitorMode::Train)?
            .with_log_interval(config.log_interval)
    };
    let mut evaluator = evaluator::<E>(env_config, config)?;
    let step_proc = SimpleStepProcessor::<Monitor<E>, TensorBatch, TensorBatch>::build(
        &SimpleStepProcessorConfig::default(),
    );
    let mut buffer = ReplayBuffer::build(
        &SimpleReplayBufferConfig::default()
            .capacity(config.replay_buffer_capacity)
            .seed(config.seed as u64),
    );
    let mut recorder = TensorboardRecorder::new(config.path("tensorboard"));

    let mut trainer = Trainer::build(trainer_config);
    trainer.train(
        env,
        step_proc,
        agent,
        &mut buffer,
        &mut recorder,
        &mut evaluator,
    )
}

/// Trains a registered model.
///
/// [`ModelKind::BLR`] is a component of BDQN and cannot be trained on its own.
pub fn train(kind: ModelKind, config: &RunConfig) -> Result<Option<f32>> {
    if !kind.is_agent() {
        bail!("{} is not an agent and cannot be trained on its own", kind);
    }

    fs::create_dir_all(&config.log_dir)?;
    config.save(config.path("config.yaml"))?;
    info!(
        "Training {} for {} optimization steps, logging in {}",
        kind, config.max_opts, config.log_dir
    );

    let seed = config.seed as u64;
    let batch_size = config.batch_size;
    let cartpole = CartPoleConfig::default();
    let pendulum = PendulumConfig::default();

    let best = match kind {
        ModelKind::DQN | ModelKind::DDQN => {
            let agent_config = DqnConfig::default()
                .model_config(value_model_config(config, CARTPOLE_N_ACTIONS))
                .batch_size(batch_size)
                .double_dqn(kind == ModelKind::DDQN)
                .explorer(explorer(config))
                .seed(seed);
            let mut agent = Dqn::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<CartPole, _>(&mut agent, cartpole, config)?
        }
        ModelKind::C51 => {
            let agent_config = C51Config::default()
                .model_config(value_model_config(config, CARTPOLE_N_ACTIONS))
                .batch_size(batch_size)
                .atoms(51, 0.0, 100.0)
                .explorer(explorer(config))
                .seed(seed);
            let mut agent = C51::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<CartPole, _>(&mut agent, cartpole, config)?
        }
        ModelKind::QRDQN | ModelKind::QRDQN_TS => {
            let policy = match kind {
                ModelKind::QRDQN_TS => QrDqnPolicy::ThompsonSampling,
                _ => QrDqnPolicy::Greedy(explorer(config)),
            };
            let agent_config = QrDqnConfig::default()
                .model_config(value_model_config(config, CARTPOLE_N_ACTIONS))
                .batch_size(batch_size)
                .policy(policy)
                .seed(seed);
            let mut agent = QrDqn::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<CartPole, _>(&mut agent, cartpole, config)?
        }
        ModelKind::BstrapDQN
        | ModelKind::BstrapDQN_Ensemble
        | ModelKind::BstrapDQN_UCB
        | ModelKind::BstrapDQN_IDS => {
            let policy = match kind {
                ModelKind::BstrapDQN_Ensemble => BstrapPolicy::Ensemble,
                ModelKind::BstrapDQN_UCB => BstrapPolicy::Ucb { kappa: 0.1 },
                ModelKind::BstrapDQN_IDS => BstrapPolicy::Ids {
                    n_stds: 0.1,
                    rho2: 1.0,
                },
                _ => BstrapPolicy::Bootstrap,
            };
            let agent_config = BstrapDqnConfig::default()
                .model_config(value_model_config(config, CARTPOLE_N_ACTIONS))
                .batch_size(batch_size)
                .policy(policy)
                .seed(seed);
            let mut agent = BstrapDqn::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<CartPole, _>(&mut agent, cartpole, config)?
        }
        ModelKind::BstrapQRDQN | ModelKind::BstrapQRDQN_IDS => {
            let policy = match kind {
                ModelKind::BstrapQRDQN_IDS => BstrapQrDqnPolicy::Ids { n_stds: 0.1 },
                _ => BstrapQrDqnPolicy::Bootstrap,
            };
            let agent_config = BstrapQrDqnConfig::default()
                .model_config(value_model_config(config, CARTPOLE_N_ACTIONS))
                .batch_size(batch_size)
                .policy(policy)
                .seed(seed);
            let mut agent = BstrapQrDqn::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<CartPole, _>(&mut agent, cartpole, config)?
        }
        ModelKind::BDQN | ModelKind::BDQN_UCB | ModelKind::BDQN_IDS => {
            let policy = match kind {
                ModelKind::BDQN_UCB => BdqnPolicy::Ucb { kappa: 0.1 },
                ModelKind::BDQN_IDS => BdqnPolicy::Ids { n_stds: 0.1 },
                _ => BdqnPolicy::Thompson,
            };
            let agent_config = BdqnConfig::default()
                .model_config(value_model_config(config, BDQN_FEATURE_DIM))
                .n_actions(CARTPOLE_N_ACTIONS)
                .batch_size(batch_size)
                .policy(policy)
                .seed(seed);
            let mut agent = Bdqn::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<CartPole, _>(&mut agent, cartpole, config)?
        }
        ModelKind::DDPG => {
            let agent_config = DdpgConfig::default()
                .actor_config(actor_config(config))
                .critic_config(critic_config(config))
                .batch_size(batch_size)
                .seed(seed);
            let mut agent =
                Ddpg::<ContinuousEnv, Mlp, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<Pendulum, _>(&mut agent, pendulum, config)?
        }
        ModelKind::QRDDPG => {
            let agent_config = QrDdpgConfig::default()
                .actor_config(actor_config(config))
                .critic_config(critic_config(config))
                .batch_size(batch_size)
                .seed(seed);
            let mut agent =
                QrDdpg::<ContinuousEnv, Mlp, Mlp, ReplayBuffer>::build(agent_config)?;
            train_agent::<Pendulum, _>(&mut agent, pendulum, config)?
        }
        ModelKind::BLR => bail!("{} cannot be trained", kind),
    };

    if let Some(r) = best {
        info!("Best evaluation reward of {}: {}", kind, r);
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rltf_core::Evaluator;
    use tempdir::TempDir;

    fn short_run(dir: &TempDir) -> RunConfig {
        RunConfig::default()
            .max_opts(4)
            .warmup_period(16)
            .eval_interval(2)
            .n_episodes_per_eval(1)
            .batch_size(8)
            .units(vec![8])
            .log_interval(10)
            .log_dir(dir.path().to_string_lossy())
    }

    #[test]
    fn test_blr_is_not_trainable() -> Result<()> {
        let dir = TempDir::new("run_blr")?;
        assert!(train(ModelKind::BLR, &short_run(&dir)).is_err());
        assert!(!dir.path().join("config.yaml").exists());
        Ok(())
    }

    #[test]
    fn test_train_ddqn() -> Result<()> {
        let dir = TempDir::new("run_ddqn")?;
        let config = short_run(&dir);
        let best = train(ModelKind::DDQN, &config)?;
        assert!(best.map_or(false, |r| r >= 1.0));
        assert_eq!(RunConfig::load(dir.path().join("config.yaml"))?, config);
        for name in ["train", "eval", "tensorboard", "model"] {
            assert!(dir.path().join(name).exists(), "{} is missing", name);
        }
        assert!(dir.path().join("model").join("4").join("qnet.safetensors").exists());
        Ok(())
    }

    #[test]
    fn test_eval_stats_are_logged() -> Result<()> {
        let dir = TempDir::new("run_eval")?;
        let config = short_run(&dir).n_episodes_per_eval(2);
        let agent_config = DqnConfig::default()
            .model_config(value_model_config(&config, CARTPOLE_N_ACTIONS))
            .eps_eval(0.0);
        let mut agent = Dqn::<DiscreteEnv, Mlp, ReplayBuffer>::build(agent_config)?;
        let mut evaluator = evaluator::<CartPole>(CartPoleConfig::default().max_steps(20), &config)?;

        let record = evaluator.evaluate(&mut agent)?;
        assert_eq!(record.get_scalar("eval/episodes")?, 2.0);
        assert_eq!(
            record.get_scalar("eval/mean_ep_rew")?,
            record.get_scalar("eval_reward")?
        );
        assert_eq!(evaluator.monitor().episode_lens(MonitorMode::Eval).len(), 2);
        Ok(())
    }

    #[test]
    fn test_train_ddpg() -> Result<()> {
        let dir = TempDir::new("run_ddpg")?;
        let best = train(ModelKind::DDPG, &short_run(&dir))?;
        assert!(best.map_or(false, |r| r <= 0.0));
        assert!(dir.path().join("model").join("4").join("actor.safetensors").exists());
        Ok(())
    }
}

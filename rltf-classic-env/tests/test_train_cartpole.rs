use anyhow::Result;
use rltf_candle_agent::{
    bdqn::{Bdqn, BdqnConfig, BdqnPolicy},
    bstrap_dqn::{BstrapDqn, BstrapDqnConfig, BstrapPolicy},
    bstrap_qrdqn::{BstrapQrDqn, BstrapQrDqnConfig, BstrapQrDqnPolicy},
    c51::{C51Config, C51},
    dqn::{Dqn, DqnConfig, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    qrdqn::{QrDqn, QrDqnConfig, QrDqnPolicy},
    value::ValueModelConfig,
    Activation, TensorBatch,
};
use rltf_classic_env::{CartPole, CartPoleConfig};
use rltf_core::{
    generic_replay_buffer::{
        SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
        SimpleStepProcessorConfig,
    },
    record::BufferedRecorder,
    Agent, Configurable, DefaultEvaluator, Env, Policy, ReplayBufferBase, StepProcessor, Trainer,
    TrainerConfig,
};
use std::path::Path;
use tempdir::TempDir;

type StepProc = SimpleStepProcessor<CartPole, TensorBatch, TensorBatch>;
type ReplayBuffer = SimpleReplayBuffer<TensorBatch, TensorBatch>;

const OBS_DIM: usize = 4;
const N_ACTIONS: usize = 2;
const MAX_OPTS: usize = 20;

fn env_config() -> CartPoleConfig {
    CartPoleConfig::default().max_steps(50)
}

fn model_config(out_dim: usize) -> ValueModelConfig<MlpConfig> {
    ValueModelConfig::default().q_config(MlpConfig::new(
        OBS_DIM,
        vec![32, 32],
        out_dim,
        Activation::None,
    ))
}

/// Trains an agent for a few optimization steps and returns the best evaluation reward.
fn train<A: Agent<CartPole, ReplayBuffer>>(agent: &mut A, model_dir: &Path) -> Result<Option<f32>> {
    let config = TrainerConfig::default()
        .max_opts(MAX_OPTS)
        .warmup_period(64)
        .eval_interval(10)
        .save_interval(MAX_OPTS)
        .record_agent_info_interval(1)
        .flush_record_interval(10)
        .model_dir(model_dir.to_string_lossy());

    let env = CartPole::build(&env_config(), 0)?;
    let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    let mut buffer =
        ReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(1000));
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = DefaultEvaluator::<CartPole>::new(&env_config(), 1, 2)?;

    let mut trainer = Trainer::<CartPole, StepProc, ReplayBuffer>::build(config);
    let best = trainer.train(
        env,
        step_proc,
        agent,
        &mut buffer,
        &mut recorder,
        &mut evaluator,
    )?;

    let last = recorder.iter().last().expect("no records");
    assert!(last.get_scalar("loss_critic")?.is_finite());
    assert!(model_dir.join(MAX_OPTS.to_string()).exists());
    Ok(best)
}

/// Runs an evaluation episode and returns its total reward.
fn eval_episode<P: Policy<CartPole>>(policy: &mut P) -> Result<f32> {
    let mut env = CartPole::build(&env_config(), 0)?;
    let mut obs = env.reset_with_index(0)?;
    policy.reset();
    let mut total = 0.0;
    loop {
        let act = policy.sample(&obs)?;
        let (step, _) = env.step(&act)?;
        total += step.reward[0];
        if step.is_done() {
            return Ok(total);
        }
        obs = step.obs;
    }
}

#[test]
fn test_dqn_cartpole() -> Result<()> {
    let dir = TempDir::new("dqn_cartpole")?;
    let config = DqnConfig::default()
        .model_config(model_config(N_ACTIONS))
        .batch_size(16)
        .double_dqn(true)
        .eps_eval(0.0)
        .explorer(EpsilonGreedy::with_final_step(100));
    let mut agent = Dqn::<CartPole, Mlp, ReplayBuffer>::build(config.clone())?;
    let best = train(&mut agent, dir.path())?;
    assert!(best.map_or(false, |r| r >= 1.0));

    // Parameters saved after the last optimization step give the same greedy policy.
    agent.eval();
    let reward = eval_episode(&mut agent)?;
    let mut restored = Dqn::<CartPole, Mlp, ReplayBuffer>::build(config.seed(7))?;
    restored.load_params(&dir.path().join(MAX_OPTS.to_string()))?;
    restored.eval();
    assert_eq!(eval_episode(&mut restored)?, reward);
    Ok(())
}

#[test]
fn test_c51_cartpole() -> Result<()> {
    let dir = TempDir::new("c51_cartpole")?;
    let config = C51Config::default()
        .model_config(model_config(N_ACTIONS))
        .batch_size(16)
        .atoms(11, 0.0, 50.0);
    let mut agent = C51::<CartPole, Mlp, ReplayBuffer>::build(config)?;
    train(&mut agent, dir.path())?;
    assert!(dir.path().join("best").join("qnet.safetensors").exists());
    Ok(())
}

#[test]
fn test_qrdqn_thompson_sampling_cartpole() -> Result<()> {
    let dir = TempDir::new("qrdqn_cartpole")?;
    let config = QrDqnConfig::default()
        .model_config(model_config(N_ACTIONS))
        .batch_size(16)
        .n_quantiles(8)
        .policy(QrDqnPolicy::ThompsonSampling);
    let mut agent = QrDqn::<CartPole, Mlp, ReplayBuffer>::build(config)?;
    train(&mut agent, dir.path())?;
    Ok(())
}

#[test]
fn test_bstrap_dqn_cartpole() -> Result<()> {
    for policy in [
        BstrapPolicy::Bootstrap,
        BstrapPolicy::Ensemble,
        BstrapPolicy::Ucb { kappa: 0.1 },
        BstrapPolicy::Ids {
            n_stds: 0.1,
            rho2: 1.0,
        },
    ] {
        let dir = TempDir::new("bstrap_dqn_cartpole")?;
        let config = BstrapDqnConfig::default()
            .model_config(model_config(N_ACTIONS))
            .n_heads(4)
            .mask_prob(0.5)
            .batch_size(16)
            .policy(policy);
        let mut agent = BstrapDqn::<CartPole, Mlp, ReplayBuffer>::build(config)?;
        train(&mut agent, dir.path())?;
    }
    Ok(())
}

#[test]
fn test_bstrap_qrdqn_ids_cartpole() -> Result<()> {
    let dir = TempDir::new("bstrap_qrdqn_cartpole")?;
    let config = BstrapQrDqnConfig::default()
        .model_config(model_config(N_ACTIONS))
        .n_heads(4)
        .n_quantiles(8)
        .batch_size(16)
        .policy(BstrapQrDqnPolicy::Ids { n_stds: 0.1 });
    let mut agent = BstrapQrDqn::<CartPole, Mlp, ReplayBuffer>::build(config)?;
    train(&mut agent, dir.path())?;
    Ok(())
}

#[test]
fn test_bdqn_cartpole() -> Result<()> {
    for policy in [
        BdqnPolicy::Thompson,
        BdqnPolicy::Ucb { kappa: 0.1 },
        BdqnPolicy::Ids { n_stds: 0.1 },
    ] {
        let dir = TempDir::new("bdqn_cartpole")?;
        let config = BdqnConfig::default()
            .model_config(model_config(16))
            .n_actions(N_ACTIONS)
            .blr_update_interval(10)
            .blr_batch_size(64)
            .sample_interval(10)
            .batch_size(16)
            .policy(policy);
        let mut agent = Bdqn::<CartPole, Mlp, ReplayBuffer>::build(config)?;
        train(&mut agent, dir.path())?;
        assert!(dir
            .path()
            .join(MAX_OPTS.to_string())
            .join("blr.safetensors")
            .exists());
    }
    Ok(())
}

use anyhow::Result;
use rltf_candle_agent::{
    ddpg::{ActionNoiseConfig, ActorConfig, CriticConfig, Ddpg, DdpgConfig},
    mlp::{Mlp, MlpConfig},
    qrddpg::{QrDdpg, QrDdpgConfig},
    Activation, TensorBatch,
};
use rltf_classic_env::{Pendulum, PendulumConfig};
use rltf_core::{
    generic_replay_buffer::{
        SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
        SimpleStepProcessorConfig,
    },
    monitor::{Monitor, MonitorConfig, MonitorMode, MonitoredEvaluator},
    record::BufferedRecorder,
    Agent, Configurable, Env, ReplayBufferBase, StepProcessor, Trainer, TrainerConfig,
};
use tempdir::TempDir;

type MonitoredPendulum = Monitor<Pendulum>;
type StepProc = SimpleStepProcessor<MonitoredPendulum, TensorBatch, TensorBatch>;
type ReplayBuffer = SimpleReplayBuffer<TensorBatch, TensorBatch>;

const OBS_DIM: usize = 3;
const ACT_DIM: usize = 1;
const MAX_OPTS: usize = 20;

fn actor_config() -> ActorConfig<MlpConfig> {
    ActorConfig::default().pi_config(MlpConfig::new(
        OBS_DIM,
        vec![32, 32],
        ACT_DIM,
        Activation::Tanh,
    ))
}

fn critic_config() -> CriticConfig<MlpConfig> {
    CriticConfig::default().q_config(MlpConfig::new(
        OBS_DIM + ACT_DIM,
        vec![32, 32],
        1,
        Activation::None,
    ))
}

/// Trains an agent on a monitored pendulum and returns the monitor directory.
fn train<A: Agent<MonitoredPendulum, ReplayBuffer>>(agent: &mut A) -> Result<TempDir> {
    let dir = TempDir::new("pendulum")?;
    let env_config = PendulumConfig::default().max_steps(30);
    let train_dir = dir.path().join("train");
    let eval_dir = dir.path().join("eval");
    let config = TrainerConfig::default()
        .max_opts(MAX_OPTS)
        .warmup_period(40)
        .eval_interval(MAX_OPTS)
        .record_agent_info_interval(1)
        .flush_record_interval(1);

    let env = Monitor::new(Pendulum::build(&env_config, 0)?, &train_dir, MonitorMode::Train)?;
    let eval_config = MonitorConfig::new(
        env_config,
        eval_dir.to_string_lossy(),
        MonitorMode::Eval,
    );
    let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(500));
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = MonitoredEvaluator::<Pendulum>::new(&eval_config, 1, 2)?;

    let mut trainer = Trainer::<MonitoredPendulum, StepProc, ReplayBuffer>::build(config);
    let best = trainer.train(
        env,
        step_proc,
        agent,
        &mut buffer,
        &mut recorder,
        &mut evaluator,
    )?;

    // Rewards of the pendulum are never positive.
    assert!(best.map_or(false, |r| r <= 0.0));
    assert_eq!(recorder.len(), MAX_OPTS);
    let last = recorder.iter().last().expect("no records");
    assert!(last.get_scalar("loss_critic")?.is_finite());
    assert!(last.get_scalar("loss_actor")?.is_finite());
    let eval_reward = last.get_scalar("eval_reward")?;
    let mean_ep_rew = last.get_scalar("eval/mean_ep_rew")?;
    assert!((eval_reward - mean_ep_rew).abs() <= 1e-3 * eval_reward.abs().max(1.0));
    assert_eq!(last.get_scalar("eval/episodes")?, 2.0);

    // Two evaluation episodes were recorded by the monitor of the evaluator.
    let eval_env = evaluator.monitor();
    assert_eq!(eval_env.episode_rewards(MonitorMode::Eval).len(), 2);
    assert_eq!(eval_env.episode_lens(MonitorMode::Eval), &[30, 30]);
    Ok(dir)
}

#[test]
fn test_ddpg_pendulum() -> Result<()> {
    let config = DdpgConfig::default()
        .actor_config(actor_config())
        .critic_config(critic_config())
        .action_noise(ActionNoiseConfig::Gaussian { sigma: 0.1 })
        .batch_size(16);
    let mut agent = Ddpg::<MonitoredPendulum, Mlp, Mlp, ReplayBuffer>::build(config)?;
    let _dir = train(&mut agent)?;

    let model_dir = TempDir::new("ddpg_params")?;
    agent.save_params(model_dir.path())?;
    for name in ["actor", "actor_tgt", "critic", "critic_tgt"] {
        assert!(model_dir
            .path()
            .join(format!("{}.safetensors", name))
            .exists());
    }
    agent.load_params(model_dir.path())?;
    Ok(())
}

#[test]
fn test_qrddpg_pendulum() -> Result<()> {
    let config = QrDdpgConfig::default()
        .actor_config(actor_config())
        .critic_config(critic_config())
        .n_quantiles(8)
        .batch_size(16);
    let mut agent = QrDdpg::<MonitoredPendulum, Mlp, Mlp, ReplayBuffer>::build(config)?;
    let _dir = train(&mut agent)?;
    Ok(())
}

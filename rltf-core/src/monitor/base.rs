use super::{LogInfo, MonitorConfig, MonitorMode, StatsRecorder};
use crate::{
    error::RltfError,
    record::{Record, RecordValue::Scalar},
    Env, Step,
};
use anyhow::Result;
use log::{info, warn};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

/// Wraps an environment and records statistics of its episodes.
///
/// While the monitor is enabled, the wrapped environment must be reset before
/// the first step and after the end of every episode, otherwise [`Env::step`]
/// fails with [`RltfError::ResetNeeded`]. When an episode ends, the record
/// returned by [`Env::step`] has `episode_reward` and `episode_length`.
///
/// The data is saved in `<log_dir>/data` when the monitor is closed, which
/// also happens when it is dropped. A closed monitor passes steps and resets
/// to the wrapped environment without recording anything.
pub struct Monitor<E: Env> {
    env: E,
    log_dir: PathBuf,
    stats_recorder: StatsRecorder,
    log_interval: Option<usize>,
    env_started: bool,
    done: bool,
    enabled: bool,
}

impl<E: Env> Monitor<E> {
    /// Wraps `env`, creating `log_dir` if it does not exist.
    pub fn new(env: E, log_dir: impl AsRef<Path>, mode: MonitorMode) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        if !log_dir.exists() {
            info!("Creating monitor directory {:?}", log_dir);
            create_dir_all(&log_dir)?;
        }

        let stats_recorder = StatsRecorder::new(log_dir.join("data"), mode);
        info!("Monitor mode set to {}", mode);

        Ok(Self {
            env,
            log_dir,
            stats_recorder,
            log_interval: None,
            env_started: false,
            done: false,
            enabled: true,
        })
    }

    /// Logs statistics every `log_interval` training steps. `0` disables logging.
    ///
    /// The logged statistics are merged into the record returned by [`Env::step`].
    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = Some(log_interval).filter(|&v| v > 0);
        self
    }

    /// Returns a reference to the wrapped environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Directory of the monitor.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Current mode.
    pub fn mode(&self) -> MonitorMode {
        self.stats_recorder.mode()
    }

    /// Sets the mode.
    ///
    /// Changing the mode ends the running episode, so the environment
    /// must be reset before the next step.
    pub fn set_mode(&mut self, mode: MonitorMode) {
        if mode != self.mode() {
            self.env_started = false;
        }
        self.stats_recorder.set_mode(mode);
        info!("Monitor mode set to {}", mode);
    }

    /// Returns `true` until the monitor is closed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The total number of steps in the given mode.
    pub fn total_steps(&self, mode: MonitorMode) -> usize {
        self.stats_recorder.total_steps(mode)
    }

    /// 0-based id of the current episode within the current mode.
    pub fn episode_id(&self) -> usize {
        self.stats_recorder.episode_id()
    }

    /// Returns of the finished episodes in the given mode.
    pub fn episode_rewards(&self, mode: MonitorMode) -> &[f32] {
        self.stats_recorder.episode_rewards(mode)
    }

    /// Lengths of the finished episodes in the given mode.
    pub fn episode_lens(&self, mode: MonitorMode) -> &[usize] {
        self.stats_recorder.episode_lens(mode)
    }

    /// Sets custom entries of [`Monitor::log_stats`].
    pub fn define_log_info(&mut self, log_info: Vec<LogInfo>) {
        self.stats_recorder.define_log_info(log_info);
    }

    /// Logs the statistics at agent step `t`.
    pub fn log_stats(&mut self, t: usize) -> Record {
        self.stats_recorder.log_stats(t)
    }

    /// Mean return of the last 100 episodes in the current mode.
    pub fn mean_ep_rew(&self) -> Option<f32> {
        self.stats_recorder.mean_ep_rew()
    }

    /// Saves the statistics.
    pub fn save(&self) -> Result<()> {
        self.stats_recorder.save()
    }

    /// Saves the statistics and disables the monitor. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        self.stats_recorder.close()?;
        self.enabled = false;
        info!("Monitor successfully closed and saved at {:?}", self.log_dir);
        Ok(())
    }

    fn check_can_step(&self) -> Result<()> {
        if self.done {
            return Err(RltfError::ResetNeeded(
                "cannot step beyond the end of an episode, call reset() to start the next one"
                    .to_string(),
            )
            .into());
        }
        if !self.env_started {
            return Err(RltfError::ResetNeeded(
                "must call reset() before the initial step".to_string(),
            )
            .into());
        }
        Ok(())
    }

    fn after_reset(&mut self) {
        self.stats_recorder.after_reset();
        self.env_started = true;
        self.done = false;
    }
}

fn into_monitor_step<E: Env>(step: Step<E>) -> Step<Monitor<E>> {
    Step::new(
        step.obs,
        step.act,
        step.reward,
        step.is_terminated,
        step.is_truncated,
        step.info,
        step.init_obs,
    )
}

impl<E: Env> Env for Monitor<E> {
    type Config = MonitorConfig<E::Config>;
    type Obs = E::Obs;
    type Act = E::Act;
    type Info = E::Info;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let env = E::build(&config.env_config, seed)?;
        let monitor = Self::new(env, &config.log_dir, config.mode)?;
        Ok(match config.log_interval {
            Some(v) => monitor.with_log_interval(v),
            None => monitor,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        if !self.enabled {
            let (step, record) = self.env.step(a)?;
            return Ok((into_monitor_step(step), record));
        }

        self.check_can_step()?;
        self.stats_recorder.before_step()?;
        let (step, mut record) = self.env.step(a)?;
        self.done = step.is_done();

        if let Some(episode) = self.stats_recorder.after_step(step.reward[0], self.done)? {
            record.insert("episode_reward", Scalar(episode.reward));
            record.insert("episode_length", Scalar(episode.length as f32));
        }

        if let Some(log_interval) = self.log_interval {
            let t = self.total_steps(MonitorMode::Train);
            if self.mode() == MonitorMode::Train && t % log_interval == 0 {
                record.merge_inplace(self.stats_recorder.log_stats(t));
            }
        }

        Ok((into_monitor_step(step), record))
    }

    fn reset(&mut self, is_done: Option<&Vec<i8>>) -> Result<Self::Obs> {
        if !self.enabled {
            return self.env.reset(is_done);
        }

        self.stats_recorder.before_reset();
        let obs = self.env.reset(is_done)?;
        self.after_reset();
        Ok(obs)
    }

    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        if !self.enabled {
            return self.env.reset_with_index(ix);
        }

        self.stats_recorder.before_reset();
        let obs = self.env.reset_with_index(ix)?;
        self.after_reset();
        Ok(obs)
    }
}

impl<E: Env> Drop for Monitor<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close the monitor at {:?}: {}", self.log_dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{DummyAct, DummyEnv};
    use tempdir::TempDir;

    fn monitor(dir: &TempDir, episode_len: usize) -> Result<Monitor<DummyEnv>> {
        let env = DummyEnv::build(&episode_len, 0)?;
        Monitor::new(env, dir.path().join("monitor"), MonitorMode::Train)
    }

    fn reset_needed(result: Result<(Step<Monitor<DummyEnv>>, Record)>) -> bool {
        match result {
            Err(e) => matches!(
                e.downcast_ref::<RltfError>(),
                Some(RltfError::ResetNeeded(_))
            ),
            Ok(_) => false,
        }
    }

    #[test]
    fn test_step_requires_reset() -> Result<()> {
        let dir = TempDir::new("monitor")?;
        let mut monitor = monitor(&dir, 2)?;
        let a = DummyAct(0.0);

        assert!(reset_needed(monitor.step(&a)));

        monitor.reset(None)?;
        monitor.step(&a)?;
        let (step, record) = monitor.step(&a)?;
        assert!(step.is_done());
        assert_eq!(record.get_scalar("episode_reward")?, 2.0);
        assert_eq!(record.get_scalar("episode_length")?, 2.0);

        assert!(reset_needed(monitor.step(&a)));
        monitor.reset(None)?;
        assert!(monitor.step(&a).is_ok());
        Ok(())
    }

    #[test]
    fn test_modes() -> Result<()> {
        let dir = TempDir::new("monitor")?;
        let mut monitor = monitor(&dir, 3)?;
        let a = DummyAct(0.0);

        monitor.reset(None)?;
        for _ in 0..3 {
            monitor.step(&a)?;
        }
        monitor.reset(None)?;
        monitor.step(&a)?;

        monitor.set_mode(MonitorMode::Eval);
        assert!(reset_needed(monitor.step(&a)));
        assert_eq!(monitor.episode_id(), 0);
        monitor.reset_with_index(0)?;
        for _ in 0..3 {
            monitor.step(&a)?;
        }

        assert_eq!(monitor.total_steps(MonitorMode::Train), 4);
        assert_eq!(monitor.total_steps(MonitorMode::Eval), 3);
        assert_eq!(monitor.episode_rewards(MonitorMode::Train), &[3.0]);
        assert_eq!(monitor.episode_lens(MonitorMode::Eval), &[3]);
        assert_eq!(monitor.mean_ep_rew(), Some(3.0));
        Ok(())
    }

    #[test]
    fn test_close() -> Result<()> {
        let dir = TempDir::new("monitor")?;
        let mut monitor = monitor(&dir, 1)?;
        let a = DummyAct(0.0);

        monitor.reset(None)?;
        monitor.step(&a)?;
        monitor.close()?;
        monitor.close()?;
        assert!(!monitor.is_enabled());
        assert!(dir.path().join("monitor/data/train_episodes.csv").exists());

        // Closed monitors pass steps through.
        let (_, record) = monitor.step(&a)?;
        assert!(record.is_empty());
        assert_eq!(monitor.total_steps(MonitorMode::Train), 1);
        Ok(())
    }

    #[test]
    fn test_build_and_drop() -> Result<()> {
        let dir = TempDir::new("monitor")?;
        let log_dir = dir.path().join("built");
        let config = MonitorConfig::new(2usize, log_dir.to_str().unwrap(), MonitorMode::Train)
            .log_interval(2);
        {
            let mut monitor = Monitor::<DummyEnv>::build(&config, 0)?;
            let a = DummyAct(0.0);
            monitor.reset(None)?;
            monitor.step(&a)?;
            let (_, record) = monitor.step(&a)?;
            assert_eq!(record.get_scalar("train/episodes")?, 1.0);
            assert_eq!(record.get_scalar("agent_step")?, 2.0);
        }
        assert!(log_dir.join("data/train_episodes.csv").exists());
        Ok(())
    }

    #[test]
    fn test_zero_log_interval_disables_logging() -> Result<()> {
        let dir = TempDir::new("monitor")?;
        let log_dir = dir.path().join("built");
        let config = MonitorConfig::new(2usize, log_dir.to_str().unwrap(), MonitorMode::Train)
            .log_interval(0);
        let mut monitor = Monitor::<DummyEnv>::build(&config, 0)?;
        let a = DummyAct(0.0);

        monitor.reset(None)?;
        monitor.step(&a)?;
        let (step, record) = monitor.step(&a)?;
        assert!(step.is_done());
        assert!(record.get_scalar("agent_step").is_err());
        assert_eq!(record.get_scalar("episode_length")?, 2.0);
        Ok(())
    }
}

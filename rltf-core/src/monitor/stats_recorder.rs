use super::MonitorMode;
use crate::{
    error::RltfError,
    record::{Record, RecordValue::Scalar},
};
use anyhow::Result;
use log::{info, warn};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    time::Instant,
};

/// The number of most recent episodes the mean statistics are taken over.
const N_RECENT_EPISODES: usize = 100;

/// A custom entry of [`StatsRecorder::log_stats`]: a label and a function giving the value.
pub type LogInfo = (String, Box<dyn Fn() -> f32>);

/// Statistics of a finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStats {
    /// Mode in which the episode ran.
    pub mode: MonitorMode,

    /// 0-based id of the episode within its mode.
    pub episode_id: usize,

    /// Undiscounted return.
    pub reward: f32,

    /// The number of steps.
    pub length: usize,
}

#[derive(Default)]
struct ModeStats {
    steps: usize,
    ep_rews: Vec<f32>,
    ep_lens: Vec<usize>,
}

impl ModeStats {
    fn recent_mean<T: Copy>(vs: &[T], to_f64: impl Fn(T) -> f64) -> Option<f32> {
        match vs.len() {
            0 => None,
            n => {
                let vs = &vs[n.saturating_sub(N_RECENT_EPISODES)..];
                let sum: f64 = vs.iter().map(|&v| to_f64(v)).sum();
                Some((sum / vs.len() as f64) as f32)
            }
        }
    }

    fn mean_ep_rew(&self) -> Option<f32> {
        Self::recent_mean(&self.ep_rews, f64::from)
    }

    fn mean_ep_len(&self) -> Option<f32> {
        Self::recent_mean(&self.ep_lens, |l| l as f64)
    }
}

/// The episode currently running.
#[derive(Debug, Clone, Copy, Default)]
struct Episode {
    reward: f32,
    length: usize,
}

/// Keeps per-episode statistics of a monitored environment.
///
/// Steps, returns and lengths of episodes are kept separately for the training
/// and the evaluation mode. The hooks `before_*`/`after_*` are called by
/// [`Monitor`](super::Monitor) around the steps and resets of the wrapped environment.
pub struct StatsRecorder {
    log_dir: PathBuf,
    mode: MonitorMode,
    train: ModeStats,
    eval: ModeStats,
    episode: Option<Episode>,
    log_info: Vec<LogInfo>,
    best_mean_ep_rew: Option<f32>,

    // Evaluation episodes already reported by log_stats().
    n_eval_eps_logged: usize,

    last_log: (Instant, usize),
    closed: bool,
}

impl StatsRecorder {
    /// Constructs a recorder saving its data in `log_dir`.
    pub fn new(log_dir: impl AsRef<Path>, mode: MonitorMode) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            mode,
            train: ModeStats::default(),
            eval: ModeStats::default(),
            episode: None,
            log_info: vec![],
            best_mean_ep_rew: None,
            n_eval_eps_logged: 0,
            last_log: (Instant::now(), 0),
            closed: false,
        }
    }

    fn stats(&self, mode: MonitorMode) -> &ModeStats {
        match mode {
            MonitorMode::Train => &self.train,
            MonitorMode::Eval => &self.eval,
        }
    }

    fn stats_mut(&mut self) -> &mut ModeStats {
        match self.mode {
            MonitorMode::Train => &mut self.train,
            MonitorMode::Eval => &mut self.eval,
        }
    }

    fn discard_episode(&mut self) {
        if let Some(episode) = self.episode.take() {
            if episode.length > 0 {
                warn!(
                    "Discarding an unfinished {} episode after {} steps",
                    self.mode, episode.length
                );
            }
        }
    }

    /// Directory where the data is saved.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Current mode.
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Sets the mode. An unfinished episode is discarded.
    pub fn set_mode(&mut self, mode: MonitorMode) {
        if mode != self.mode {
            self.discard_episode();
        }
        self.mode = mode;
    }

    /// Returns `true` after [`StatsRecorder::close`].
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Called before a step of the environment.
    pub fn before_step(&self) -> Result<()> {
        if !self.closed && self.episode.is_none() {
            return Err(RltfError::ResetNeeded("no episode is running".to_string()).into());
        }
        Ok(())
    }

    /// Called after a step of the environment.
    ///
    /// Returns the statistics of the episode when it ended at this step.
    pub fn after_step(&mut self, reward: f32, done: bool) -> Result<Option<EpisodeStats>> {
        if self.closed {
            return Ok(None);
        }

        let mut episode = self
            .episode
            .take()
            .ok_or_else(|| RltfError::ResetNeeded("no episode is running".to_string()))?;
        episode.reward += reward;
        episode.length += 1;

        let mode = self.mode;
        let stats = self.stats_mut();
        stats.steps += 1;

        if done {
            stats.ep_rews.push(episode.reward);
            stats.ep_lens.push(episode.length);
            Ok(Some(EpisodeStats {
                mode,
                episode_id: stats.ep_rews.len() - 1,
                reward: episode.reward,
                length: episode.length,
            }))
        } else {
            self.episode = Some(episode);
            Ok(None)
        }
    }

    /// Called before a reset of the environment.
    pub fn before_reset(&mut self) {
        if !self.closed {
            self.discard_episode();
        }
    }

    /// Called after a reset of the environment. Starts a new episode.
    pub fn after_reset(&mut self) {
        if !self.closed {
            self.episode = Some(Episode::default());
        }
    }

    /// 0-based id of the current episode within the current mode.
    pub fn episode_id(&self) -> usize {
        self.stats(self.mode).ep_rews.len()
    }

    /// The total number of steps taken in the given mode.
    pub fn total_steps(&self, mode: MonitorMode) -> usize {
        self.stats(mode).steps
    }

    /// Returns of the finished episodes in the given mode.
    pub fn episode_rewards(&self, mode: MonitorMode) -> &[f32] {
        &self.stats(mode).ep_rews
    }

    /// Lengths of the finished episodes in the given mode.
    pub fn episode_lens(&self, mode: MonitorMode) -> &[usize] {
        &self.stats(mode).ep_lens
    }

    /// Mean return of the last 100 episodes in the current mode.
    pub fn mean_ep_rew(&self) -> Option<f32> {
        self.stats(self.mode).mean_ep_rew()
    }

    /// Sets custom entries appended to the output of [`StatsRecorder::log_stats`].
    pub fn define_log_info(&mut self, log_info: Vec<LogInfo>) {
        self.log_info = log_info;
    }

    /// Logs the statistics at agent step `t` and returns them as a record.
    ///
    /// Statistics of a mode are included once the mode has steps. The evaluation
    /// statistics are taken over the evaluation episodes finished since the
    /// previous call.
    pub fn log_stats(&mut self, t: usize) -> Record {
        let mut record = Record::empty();
        record.insert("agent_step", Scalar(t as f32));

        if self.train.steps > 0 {
            record.insert("train/episodes", Scalar(self.train.ep_rews.len() as f32));
            record.insert("train/steps", Scalar(self.train.steps as f32));
        }
        if let Some(mean_ep_rew) = self.train.mean_ep_rew() {
            let best = self
                .best_mean_ep_rew
                .map_or(mean_ep_rew, |best| best.max(mean_ep_rew));
            self.best_mean_ep_rew = Some(best);
            record.insert("train/mean_ep_rew", Scalar(mean_ep_rew));
            record.insert("train/best_mean_ep_rew", Scalar(best));
        }
        if let Some(mean_ep_len) = self.train.mean_ep_len() {
            record.insert("train/mean_ep_len", Scalar(mean_ep_len));
        }

        if self.eval.steps > 0 {
            record.insert("eval/episodes", Scalar(self.eval.ep_rews.len() as f32));
            record.insert("eval/steps", Scalar(self.eval.steps as f32));
        }
        let new_eval_rews = &self.eval.ep_rews[self.n_eval_eps_logged..];
        if !new_eval_rews.is_empty() {
            let mean = new_eval_rews.iter().sum::<f32>() / new_eval_rews.len() as f32;
            record.insert("eval/mean_ep_rew", Scalar(mean));
        }
        self.n_eval_eps_logged = self.eval.ep_rews.len();

        let total_steps = self.train.steps + self.eval.steps;
        let secs = self.last_log.0.elapsed().as_secs_f32();
        if secs > 0.0 {
            let sps = (total_steps - self.last_log.1) as f32 / secs;
            record.insert("steps_per_sec", Scalar(sps));
        }
        self.last_log = (Instant::now(), total_steps);

        for (label, f) in self.log_info.iter() {
            record.insert(label.clone(), Scalar(f()));
        }

        let mut lines = vec![format!("| {:<28} | {:>14} |", "agent step", t)];
        let mut keys = record.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        for k in keys.iter().filter(|k| k.as_str() != "agent_step") {
            if let Ok(v) = record.get_scalar(k) {
                lines.push(format!("| {:<28} | {:>14.3} |", k, v));
            }
        }
        info!("Statistics\n{}", lines.join("\n"));

        record
    }

    /// Writes `<log_dir>/<mode>_episodes.csv` for each mode having finished episodes.
    pub fn save(&self) -> Result<()> {
        for mode in [MonitorMode::Train, MonitorMode::Eval] {
            let stats = self.stats(mode);
            if stats.ep_rews.is_empty() {
                continue;
            }

            create_dir_all(&self.log_dir)?;
            let path = self.log_dir.join(format!("{}_episodes.csv", mode.as_str()));
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(["episode", "reward", "length"])?;
            for (i, (rew, len)) in stats.ep_rews.iter().zip(stats.ep_lens.iter()).enumerate() {
                wtr.write_record(&[i.to_string(), rew.to_string(), len.to_string()])?;
            }
            wtr.flush()?;
        }
        Ok(())
    }

    /// Saves the data and stops recording. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.save()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn run_episode(recorder: &mut StatsRecorder, rewards: &[f32]) -> Result<Option<EpisodeStats>> {
        recorder.before_reset();
        recorder.after_reset();
        let mut stats = None;
        for (i, &r) in rewards.iter().enumerate() {
            recorder.before_step()?;
            stats = recorder.after_step(r, i == rewards.len() - 1)?;
        }
        Ok(stats)
    }

    #[test]
    fn test_episodes_per_mode() -> Result<()> {
        let dir = TempDir::new("stats_recorder")?;
        let mut recorder = StatsRecorder::new(dir.path(), MonitorMode::Train);

        run_episode(&mut recorder, &[1.0, 2.0])?;
        let stats = run_episode(&mut recorder, &[3.0, 3.0, 3.0])?;
        assert_eq!(
            stats,
            Some(EpisodeStats {
                mode: MonitorMode::Train,
                episode_id: 1,
                reward: 9.0,
                length: 3
            })
        );
        assert_eq!(recorder.episode_id(), 2);
        assert_eq!(recorder.mean_ep_rew(), Some(6.0));

        recorder.set_mode(MonitorMode::Eval);
        assert_eq!(recorder.episode_id(), 0);
        assert_eq!(recorder.mean_ep_rew(), None);
        run_episode(&mut recorder, &[5.0])?;

        assert_eq!(recorder.total_steps(MonitorMode::Train), 5);
        assert_eq!(recorder.total_steps(MonitorMode::Eval), 1);
        assert_eq!(recorder.episode_rewards(MonitorMode::Train), &[3.0, 9.0]);
        assert_eq!(recorder.episode_lens(MonitorMode::Train), &[2, 3]);
        assert_eq!(recorder.episode_rewards(MonitorMode::Eval), &[5.0]);
        Ok(())
    }

    #[test]
    fn test_partial_episode_is_discarded() -> Result<()> {
        let dir = TempDir::new("stats_recorder")?;
        let mut recorder = StatsRecorder::new(dir.path(), MonitorMode::Train);

        recorder.after_reset();
        recorder.after_step(1.0, false)?;
        recorder.before_reset();
        recorder.after_reset();
        recorder.after_step(2.0, true)?;

        assert_eq!(recorder.episode_rewards(MonitorMode::Train), &[2.0]);
        // Steps of the discarded episode are still counted.
        assert_eq!(recorder.total_steps(MonitorMode::Train), 2);

        assert!(recorder.before_step().is_err());
        assert!(recorder.after_step(1.0, false).is_err());
        Ok(())
    }

    #[test]
    fn test_log_stats() -> Result<()> {
        let dir = TempDir::new("stats_recorder")?;
        let mut recorder = StatsRecorder::new(dir.path(), MonitorMode::Train);
        let epsilon: LogInfo = ("epsilon".to_string(), Box::new(|| 0.1f32));
        recorder.define_log_info(vec![epsilon]);

        run_episode(&mut recorder, &[1.0, 1.0])?;
        run_episode(&mut recorder, &[1.0, 1.0, 1.0, 1.0])?;
        recorder.set_mode(MonitorMode::Eval);
        run_episode(&mut recorder, &[10.0])?;

        let record = recorder.log_stats(6);
        assert_eq!(record.get_scalar("agent_step")?, 6.0);
        assert_eq!(record.get_scalar("train/episodes")?, 2.0);
        assert_eq!(record.get_scalar("train/mean_ep_rew")?, 3.0);
        assert_eq!(record.get_scalar("train/best_mean_ep_rew")?, 3.0);
        assert_eq!(record.get_scalar("train/mean_ep_len")?, 3.0);
        assert_eq!(record.get_scalar("eval/mean_ep_rew")?, 10.0);
        assert_eq!(record.get_scalar("epsilon")?, 0.1);

        // No new evaluation episode since the last call.
        let record = recorder.log_stats(7);
        assert!(record.get_scalar("eval/mean_ep_rew").is_err());
        assert_eq!(record.get_scalar("eval/episodes")?, 1.0);
        Ok(())
    }

    #[test]
    fn test_log_stats_of_eval_only_recorder() -> Result<()> {
        let dir = TempDir::new("stats_recorder")?;
        let mut recorder = StatsRecorder::new(dir.path(), MonitorMode::Eval);
        run_episode(&mut recorder, &[2.0, 2.0])?;
        run_episode(&mut recorder, &[1.0])?;

        let record = recorder.log_stats(3);
        assert_eq!(record.get_scalar("eval/episodes")?, 2.0);
        assert_eq!(record.get_scalar("eval/steps")?, 3.0);
        assert_eq!(record.get_scalar("eval/mean_ep_rew")?, 2.5);
        assert!(record.get_scalar("train/episodes").is_err());
        Ok(())
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_recent_means() {
        let long = 1usize << 33;
        let stats = ModeStats {
            steps: 0,
            ep_rews: (0..150).map(|i| i as f32).collect(),
            ep_lens: vec![long, long + 2],
        };
        // Only the last 100 episodes count.
        assert_eq!(stats.mean_ep_rew(), Some(99.5));
        assert_eq!(stats.mean_ep_len(), Some((long + 1) as f32));
        assert_eq!(ModeStats::default().mean_ep_len(), None);
    }

    #[test]
    fn test_save_and_close() -> Result<()> {
        let dir = TempDir::new("stats_recorder")?;
        let log_dir = dir.path().join("data");
        let mut recorder = StatsRecorder::new(&log_dir, MonitorMode::Train);
        run_episode(&mut recorder, &[1.0, 0.5])?;
        recorder.close()?;
        recorder.close()?;
        assert!(recorder.is_closed());

        let mut rdr = csv::Reader::from_path(log_dir.join("train_episodes.csv"))?;
        let rows = rdr
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "1.5");
        assert_eq!(&rows[0][2], "2");
        assert!(!log_dir.join("eval_episodes.csv").exists());

        // Hooks are ignored after closing.
        assert_eq!(recorder.after_step(1.0, true)?, None);
        Ok(())
    }
}

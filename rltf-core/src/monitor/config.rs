//! Configuration of [`Monitor`](super::Monitor).
use super::MonitorMode;
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Monitor`](super::Monitor), used when it is built through
/// [`Env::build`](crate::Env::build).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig<C> {
    /// Configuration of the wrapped environment.
    pub env_config: C,

    /// Directory of the monitor.
    pub log_dir: String,

    /// Initial mode.
    pub mode: MonitorMode,

    /// If set, statistics are logged every `log_interval` training steps. `0` disables logging.
    pub log_interval: Option<usize>,
}

impl<C> MonitorConfig<C> {
    /// Constructs a configuration.
    pub fn new(env_config: C, log_dir: impl Into<String>, mode: MonitorMode) -> Self {
        Self {
            env_config,
            log_dir: log_dir.into(),
            mode,
            log_interval: None,
        }
    }

    /// Sets the interval of logging statistics in training steps.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = Some(v);
        self
    }
}

impl<C: Serialize + DeserializeOwned> MonitorConfig<C> {
    /// Constructs [`MonitorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`MonitorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_monitor_config() -> Result<()> {
        let config = MonitorConfig::new(200usize, "logs/eval", MonitorMode::Eval).log_interval(10);

        let dir = TempDir::new("monitor_config")?;
        let path = dir.path().join("monitor_config.yaml");
        config.save(&path)?;
        let config_ = MonitorConfig::<usize>::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}

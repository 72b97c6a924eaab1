use crate::error::RltfError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Whether a monitored environment is used for training or evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Training.
    Train,

    /// Evaluation.
    Eval,
}

impl MonitorMode {
    /// Lowercase name used in file names and record keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Eval => "eval",
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "TRAIN"),
            Self::Eval => write!(f, "EVAL"),
        }
    }
}

impl FromStr for MonitorMode {
    type Err = RltfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "t" | "train" => Ok(Self::Train),
            "e" | "eval" => Ok(Self::Eval),
            _ => Err(RltfError::InvalidMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("t".parse::<MonitorMode>(), Ok(MonitorMode::Train));
        assert_eq!("eval".parse::<MonitorMode>(), Ok(MonitorMode::Eval));
        assert_eq!(
            "x".parse::<MonitorMode>(),
            Err(RltfError::InvalidMode("x".to_string()))
        );
        assert_eq!(MonitorMode::Eval.to_string(), "EVAL");
    }
}

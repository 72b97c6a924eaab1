//! Names of the models in the catalogue.
//!
//! ```
//! use rltf_candle_agent::registry::{ActionSpace, ModelKind};
//!
//! let kind: ModelKind = "BstrapDQN_IDS".parse().unwrap();
//! assert_eq!(kind.family(), "BstrapDQN");
//! assert_eq!(kind.action_space(), ActionSpace::Discrete);
//! assert!("PPO".parse::<ModelKind>().is_err());
//! ```
use itertools::Itertools;
use rltf_core::error::RltfError;
use std::{fmt, str::FromStr};

/// Action spaces of environments a model acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSpace {
    /// Finite set of actions.
    Discrete,

    /// Boxes in `R^n`.
    Continuous,

    /// Not an agent.
    None,
}

/// Models in the catalogue.
#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    DQN,
    DDQN,
    C51,
    QRDQN,
    QRDQN_TS,
    BstrapDQN,
    BstrapDQN_Ensemble,
    BstrapDQN_UCB,
    BstrapDQN_IDS,
    BstrapQRDQN,
    BstrapQRDQN_IDS,
    BLR,
    BDQN,
    BDQN_UCB,
    BDQN_IDS,
    DDPG,
    QRDDPG,
}

impl ModelKind {
    /// All models.
    pub const ALL: [ModelKind; 17] = [
        Self::DQN,
        Self::DDQN,
        Self::C51,
        Self::QRDQN,
        Self::QRDQN_TS,
        Self::BstrapDQN,
        Self::BstrapDQN_Ensemble,
        Self::BstrapDQN_UCB,
        Self::BstrapDQN_IDS,
        Self::BstrapQRDQN,
        Self::BstrapQRDQN_IDS,
        Self::BLR,
        Self::BDQN,
        Self::BDQN_UCB,
        Self::BDQN_IDS,
        Self::DDPG,
        Self::QRDDPG,
    ];

    /// The name in the registry.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DQN => "DQN",
            Self::DDQN => "DDQN",
            Self::C51 => "C51",
            Self::QRDQN => "QRDQN",
            Self::QRDQN_TS => "QRDQN_TS",
            Self::BstrapDQN => "BstrapDQN",
            Self::BstrapDQN_Ensemble => "BstrapDQN_Ensemble",
            Self::BstrapDQN_UCB => "BstrapDQN_UCB",
            Self::BstrapDQN_IDS => "BstrapDQN_IDS",
            Self::BstrapQRDQN => "BstrapQRDQN",
            Self::BstrapQRDQN_IDS => "BstrapQRDQN_IDS",
            Self::BLR => "BLR",
            Self::BDQN => "BDQN",
            Self::BDQN_UCB => "BDQN_UCB",
            Self::BDQN_IDS => "BDQN_IDS",
            Self::DDPG => "DDPG",
            Self::QRDDPG => "QRDDPG",
        }
    }

    /// The model the variant belongs to, e.g. `BDQN` for `BDQN_UCB`.
    pub fn family(&self) -> &'static str {
        match self {
            Self::DQN | Self::DDQN => "DQN",
            Self::C51 => "C51",
            Self::QRDQN | Self::QRDQN_TS => "QRDQN",
            Self::BstrapDQN
            | Self::BstrapDQN_Ensemble
            | Self::BstrapDQN_UCB
            | Self::BstrapDQN_IDS => "BstrapDQN",
            Self::BstrapQRDQN | Self::BstrapQRDQN_IDS => "BstrapQRDQN",
            Self::BLR => "BLR",
            Self::BDQN | Self::BDQN_UCB | Self::BDQN_IDS => "BDQN",
            Self::DDPG => "DDPG",
            Self::QRDDPG => "QRDDPG",
        }
    }

    /// The action space the model acts in.
    pub fn action_space(&self) -> ActionSpace {
        match self {
            Self::BLR => ActionSpace::None,
            Self::DDPG | Self::QRDDPG => ActionSpace::Continuous,
            _ => ActionSpace::Discrete,
        }
    }

    /// Whether the model learns the distribution of the return.
    pub fn is_distributional(&self) -> bool {
        matches!(
            self,
            Self::C51
                | Self::QRDQN
                | Self::QRDQN_TS
                | Self::BstrapQRDQN
                | Self::BstrapQRDQN_IDS
                | Self::QRDDPG
        )
    }

    /// Whether the model is an agent. [`ModelKind::BLR`] is a component of BDQN.
    pub fn is_agent(&self) -> bool {
        !matches!(self, Self::BLR)
    }

    /// Names of all models, separated by commas.
    pub fn names() -> String {
        Self::ALL.iter().map(|k| k.name()).join(", ")
    }
}

impl FromStr for ModelKind {
    type Err = RltfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.name() == s)
            .copied()
            .ok_or_else(|| RltfError::UnknownModel(s.to_string()))
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_round_trip() {
        let names = ModelKind::ALL.iter().map(|k| k.name()).collect::<HashSet<_>>();
        assert_eq!(names.len(), ModelKind::ALL.len());

        for kind in ModelKind::ALL.iter() {
            assert_eq!(kind.to_string().parse::<ModelKind>(), Ok(*kind));
        }
        assert_eq!(
            "dqn".parse::<ModelKind>(),
            Err(RltfError::UnknownModel("dqn".to_string()))
        );
    }

    #[test]
    fn test_properties() {
        assert!(!ModelKind::BLR.is_agent());
        assert_eq!(ModelKind::BLR.action_space(), ActionSpace::None);
        assert_eq!(ModelKind::QRDDPG.action_space(), ActionSpace::Continuous);
        assert!(ModelKind::QRDDPG.is_distributional());
        assert!(!ModelKind::BDQN_IDS.is_distributional());
        assert_eq!(ModelKind::DDQN.family(), "DQN");
        assert!(ModelKind::names().starts_with("DQN, DDQN, C51"));
    }
}

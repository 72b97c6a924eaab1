#![warn(missing_docs)]
//! Core components of rltf.
//!
//! This crate provides the interfaces shared by every model in the catalogue
//! ([`Env`], [`Policy`], [`Agent`], replay buffers), the training loop ([`Trainer`]),
//! evaluation ([`DefaultEvaluator`]) and the episode [`monitor`] which records
//! per-episode statistics of training and evaluation runs.
pub mod dummy;
pub mod error;
pub mod generic_replay_buffer;
pub mod monitor;
pub mod record;

mod base;
pub use base::{
    Act, Agent, Configurable, Env, ExperienceBufferBase, Info, Obs, Policy, ReplayBufferBase,
    Step, StepProcessor, TransitionBatch,
};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{Sampler, Trainer, TrainerConfig};

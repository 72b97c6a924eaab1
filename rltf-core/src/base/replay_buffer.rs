//! Replay buffer interfaces.
//!
//! Pushing experiences ([`ExperienceBufferBase`]) and sampling batches
//! ([`ReplayBufferBase`]) are separate traits, so that a process which only
//! collects experiences does not need to know how batches are made.
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Self;

    /// Constructs a batch of experiences for training.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of experiences in the buffer.
    ///
    /// Buffers without prioritized sampling ignore this call.
    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_err: &Option<Vec<f32>>);
}

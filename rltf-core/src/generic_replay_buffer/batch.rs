//! Generic transition batches.
use crate::TransitionBatch;
use anyhow::Result;

/// Storage of observations or actions in a replay buffer.
///
/// The same type is used both for the storage of the whole buffer and
/// for sampled batches.
pub trait BatchBase {
    /// Creates an empty storage with the given capacity.
    fn new(capacity: usize) -> Self;

    /// Writes `data` starting at index `ix`, wrapping around the capacity.
    fn push(&mut self, ix: usize, data: Self) -> Result<()>;

    /// Gathers the elements at the given indices.
    fn sample(&self, ixs: &[usize]) -> Result<Self>
    where
        Self: Sized;
}

/// Transitions `(o_t, a_t, o_t+1, r_t)` with termination flags.
///
/// `weight` and `ix_sample` are set on batches sampled with prioritized
/// experience replay, and are used to update priorities after an
/// optimization step.
pub struct GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Next observations.
    pub next_obs: O,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminated: Vec<i8>,

    /// Truncation flags.
    pub is_truncated: Vec<i8>,

    /// Importance weights for prioritized experience replay.
    pub weight: Option<Vec<f32>>,

    /// Indices of sampled transitions.
    pub ix_sample: Option<Vec<usize>>,
}

impl<O, A> TransitionBatch for GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type ObsBatch = O;
    type ActBatch = A;

    fn unpack(
        self,
    ) -> (
        Self::ObsBatch,
        Self::ActBatch,
        Self::ObsBatch,
        Vec<f32>,
        Vec<i8>,
        Vec<i8>,
        Option<Vec<usize>>,
        Option<Vec<f32>>,
    ) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_terminated,
            self.is_truncated,
            self.ix_sample,
            self.weight,
        )
    }

    fn len(&self) -> usize {
        self.reward.len()
    }

    fn obs(&self) -> &Self::ObsBatch {
        &self.obs
    }

    fn act(&self) -> &Self::ActBatch {
        &self.act
    }
}

impl<O, A> GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Creates an empty batch with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: Vec::with_capacity(capacity),
            is_terminated: Vec::with_capacity(capacity),
            is_truncated: Vec::with_capacity(capacity),
            weight: None,
            ix_sample: None,
        }
    }
}

//! Ring buffer of transitions with optional prioritized sampling.
mod iw_scheduler;
mod sum_tree;
use super::{config::PerConfig, BatchBase, GenericTransitionBatch, SimpleReplayBufferConfig};
use crate::{ExperienceBufferBase, ReplayBufferBase, TransitionBatch};
use anyhow::{bail, Result};
pub use iw_scheduler::IwScheduler;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sum_tree::SumTree;
pub use sum_tree::WeightNormalizer;

struct PerState {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
}

impl PerState {
    fn new(capacity: usize, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(capacity, per_config.alpha, per_config.normalize),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
        }
    }
}

/// A replay buffer storing transitions of generic observation and action types.
///
/// New transitions overwrite the oldest ones once `capacity` is reached.
/// With prioritized experience replay, new transitions get the maximum priority
/// given so far, and priorities are updated with absolute TD errors through
/// [`ReplayBufferBase::update_priority`].
pub struct SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    capacity: usize,
    i: usize,
    size: usize,
    obs: O,
    act: A,
    next_obs: O,
    reward: Vec<f32>,
    is_terminated: Vec<i8>,
    is_truncated: Vec<i8>,
    rng: StdRng,
    per_state: Option<PerState>,
}

impl<O, A> SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    #[inline]
    fn push_ring<T: Copy>(buf: &mut [T], i: usize, b: &[T]) {
        let capacity = buf.len();
        for (k, v) in b.iter().enumerate() {
            buf[(i + k) % capacity] = *v;
        }
    }

    fn sample_ring<T: Copy>(buf: &[T], ixs: &[usize]) -> Vec<T> {
        ixs.iter().map(|ix| buf[*ix]).collect()
    }

    fn set_priority(&mut self, batch_size: usize) {
        if let Some(per_state) = self.per_state.as_mut() {
            let sum_tree = &mut per_state.sum_tree;
            let max_p = sum_tree.max();

            for j in 0..batch_size {
                let i = (self.i + j) % self.capacity;
                sum_tree.add(i, max_p);
            }
        }
    }

    /// Returns the sum of all rewards in the buffer.
    pub fn sum_rewards(&self) -> f32 {
        self.reward.iter().sum()
    }
}

impl<O, A> ExperienceBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Item = GenericTransitionBatch<O, A>;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        let len = tr.len();
        let (obs, act, next_obs, reward, is_terminated, is_truncated, _, _) = tr.unpack();
        self.obs.push(self.i, obs)?;
        self.act.push(self.i, act)?;
        self.next_obs.push(self.i, next_obs)?;
        Self::push_ring(&mut self.reward, self.i, &reward);
        Self::push_ring(&mut self.is_terminated, self.i, &is_terminated);
        Self::push_ring(&mut self.is_truncated, self.i, &is_truncated);
        self.set_priority(len);

        self.i = (self.i + len) % self.capacity;
        self.size = (self.size + len).min(self.capacity);

        Ok(())
    }
}

impl<O, A> ReplayBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Config = SimpleReplayBufferConfig;
    type Batch = GenericTransitionBatch<O, A>;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity;
        let per_state = config
            .per_config
            .as_ref()
            .map(|per_config| PerState::new(capacity, per_config));

        Self {
            capacity,
            i: 0,
            size: 0,
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: vec![0.; capacity],
            is_terminated: vec![0; capacity],
            is_truncated: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
            per_state,
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if self.size == 0 {
            bail!("Cannot sample a batch from an empty replay buffer");
        }

        let (ixs, weight) = match &self.per_state {
            Some(per_state) => {
                let beta = per_state.iw_scheduler.beta();
                let (ixs, weight) = per_state.sum_tree.sample(size, beta);
                (ixs, Some(weight))
            }
            None => {
                let ixs = (0..size)
                    .map(|_| self.rng.gen_range(0..self.size))
                    .collect::<Vec<_>>();
                (ixs, None)
            }
        };

        Ok(Self::Batch {
            obs: self.obs.sample(&ixs)?,
            act: self.act.sample(&ixs)?,
            next_obs: self.next_obs.sample(&ixs)?,
            reward: Self::sample_ring(&self.reward, &ixs),
            is_terminated: Self::sample_ring(&self.is_terminated, &ixs),
            is_truncated: Self::sample_ring(&self.is_truncated, &ixs),
            ix_sample: Some(ixs),
            weight,
        })
    }

    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_errs: &Option<Vec<f32>>) {
        if let (Some(per_state), Some(ixs), Some(td_errs)) = (&mut self.per_state, ixs, td_errs)
        {
            for (&ix, &td_err) in ixs.iter().zip(td_errs.iter()) {
                per_state.sum_tree.update(ix, td_err);
            }
            per_state.iw_scheduler.add_n_opts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generic_replay_buffer::PerConfig;

    /// Scalars stored in a plain vector.
    struct VecBatch(Vec<f32>);

    impl BatchBase for VecBatch {
        fn new(capacity: usize) -> Self {
            Self(vec![0.0; capacity])
        }

        fn push(&mut self, ix: usize, data: Self) -> Result<()> {
            let capacity = self.0.len();
            for (k, v) in data.0.into_iter().enumerate() {
                self.0[(ix + k) % capacity] = v;
            }
            Ok(())
        }

        fn sample(&self, ixs: &[usize]) -> Result<Self> {
            Ok(Self(ixs.iter().map(|&ix| self.0[ix]).collect()))
        }
    }

    fn transition(v: f32) -> GenericTransitionBatch<VecBatch, VecBatch> {
        GenericTransitionBatch {
            obs: VecBatch(vec![v]),
            act: VecBatch(vec![v]),
            next_obs: VecBatch(vec![v + 1.0]),
            reward: vec![v],
            is_terminated: vec![0],
            is_truncated: vec![0],
            weight: None,
            ix_sample: None,
        }
    }

    #[test]
    fn test_ring_buffer_overwrites_oldest() -> Result<()> {
        let config = SimpleReplayBufferConfig::default().capacity(3);
        let mut buffer = SimpleReplayBuffer::<VecBatch, VecBatch>::build(&config);
        assert!(buffer.batch(1).is_err());

        for v in 0..5 {
            buffer.push(transition(v as f32))?;
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.sum_rewards(), 2.0 + 3.0 + 4.0);

        let batch = buffer.batch(16)?;
        let (obs, _, next_obs, reward, _, _, ixs, weight) = batch.unpack();
        assert!(weight.is_none());
        assert_eq!(ixs.map(|ixs| ixs.len()), Some(16));
        for ((o, n), r) in obs.0.iter().zip(next_obs.0.iter()).zip(reward.iter()) {
            assert!(*o >= 2.0);
            assert_eq!(*n, o + 1.0);
            assert_eq!(r, o);
        }
        Ok(())
    }

    #[test]
    fn test_prioritized_sampling() -> Result<()> {
        let config = SimpleReplayBufferConfig::default()
            .capacity(4)
            .per_config(Some(PerConfig::default().alpha(1.0)));
        let mut buffer = SimpleReplayBuffer::<VecBatch, VecBatch>::build(&config);
        for v in 0..4 {
            buffer.push(transition(v as f32))?;
        }

        // Only transition 2 keeps a non-negligible priority.
        buffer.update_priority(&Some(vec![0, 1, 2, 3]), &Some(vec![0.0, 0.0, 5.0, 0.0]));
        let batch = buffer.batch(32)?;
        assert!(batch.weight.is_some());
        assert!(batch.obs.0.iter().all(|&o| o == 2.0));
        Ok(())
    }
}

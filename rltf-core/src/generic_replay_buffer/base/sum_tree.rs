//! Sum tree for prioritized sampling.
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};
use serde::{Deserialize, Serialize};

/// How importance weights of a batch are normalized.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Normalized by the maximum weight over all transitions in the buffer.
    All,

    /// Normalized by the maximum weight in the sampled batch.
    Batch,
}

#[derive(Debug)]
pub struct SumTree {
    eps: f32,
    alpha: f32,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f32>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    max_p: f32,
    normalize: WeightNormalizer,
}

impl SumTree {
    pub fn new(capacity: usize, alpha: f32, normalize: WeightNormalizer) -> Self {
        Self {
            eps: 1e-8,
            alpha,
            capacity,
            n_samples: 0,
            tree: vec![0f32; 2 * capacity - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            max_p: 1.0,
            normalize,
        }
    }

    fn propagate(&mut self, mut ix: usize, change: f32) {
        while ix != 0 {
            ix = (ix - 1) / 2;
            self.tree[ix] += change;
        }
    }

    fn retrieve(&self, mut ix: usize, mut s: f32) -> usize {
        loop {
            let left = 2 * ix + 1;
            let right = left + 1;

            if left >= self.tree.len() {
                return ix;
            }

            if s <= self.tree[left] || self.tree[right] == 0f32 {
                ix = left;
            } else {
                s -= self.tree[left];
                ix = right;
            }
        }
    }

    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// The maximum priority given so far, used for newly pushed transitions.
    pub fn max(&self) -> f32 {
        self.max_p
    }

    /// Sets the priority of a new transition at `ix`.
    pub fn add(&mut self, ix: usize, p: f32) {
        self.update(ix, p);

        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Sets the priority at `ix`. The alpha-th power of `p` is stored.
    pub fn update(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);

        self.max_p = self.max_p.max(p.abs());
        let p = (p.abs() + self.eps).powf(self.alpha);
        self.min_tree.modify(ix, p);
        let ix = ix + self.capacity - 1;
        let change = p - self.tree[ix];
        self.tree[ix] = p;
        self.propagate(ix, change);
    }

    /// Returns the leaf where the cumulative sum of priorities reaches `s`.
    pub fn get(&self, s: f32) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        ix + 1 - self.capacity
    }

    /// Samples indices and returns them with normalized importance weights.
    ///
    /// The weight is $w_i=\left(N P(i)\right)^{-\beta}$.
    pub fn sample(&self, batch_size: usize, beta: f32) -> (Vec<usize>, Vec<f32>) {
        let p_sum = self.total();
        let indices = (0..batch_size)
            .map(|_| self.get(p_sum * fastrand::f32()).min(self.n_samples - 1))
            .collect::<Vec<_>>();

        let n = self.n_samples as f32 / p_sum;
        let ws = indices
            .iter()
            .map(|ix| self.tree[ix + self.capacity - 1])
            .map(|p| (n * p).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = match self.normalize {
            WeightNormalizer::All => (n * self.min_tree.query(0, self.n_samples)).powf(-beta),
            WeightNormalizer::Batch => ws.iter().fold(f32::MIN, |m, v| v.max(m)),
        };

        let ws = ws.iter().map(|w| w / w_max).collect();

        (indices, ws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_tree_get() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = SumTree::new(8, 1.0, WeightNormalizer::Batch);
        for (ix, p) in data.iter().enumerate() {
            sum_tree.add(ix, *p);
        }

        assert!((sum_tree.total() - data.iter().sum::<f32>()).abs() < 1e-4);
        assert_eq!(sum_tree.get(0.0), 0);
        assert_eq!(sum_tree.get(0.4), 0);
        assert_eq!(sum_tree.get(0.6), 1);
        assert_eq!(sum_tree.get(1.2), 2);
        assert_eq!(sum_tree.get(1.6), 3);
        assert_eq!(sum_tree.get(2.0), 4);
        assert_eq!(sum_tree.get(2.8), 4);
    }

    #[test]
    fn test_sum_tree_sample() {
        let mut sum_tree = SumTree::new(4, 1.0, WeightNormalizer::All);
        sum_tree.add(0, 1.0);
        sum_tree.add(1, 3.0);

        let (ixs, ws) = sum_tree.sample(1000, 1.0);
        assert!(ixs.iter().all(|&ix| ix < 2));
        assert!(ws.iter().all(|&w| w > 0.0 && w <= 1.0 + 1e-5));

        // The transition with priority 3 is sampled about three times as often.
        let n1 = ixs.iter().filter(|&&ix| ix == 1).count();
        assert!(n1 > 600 && n1 < 900);
    }
}

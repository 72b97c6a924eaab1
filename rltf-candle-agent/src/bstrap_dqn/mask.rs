use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Bernoulli bootstrap masks.
///
/// The mask of a transition is drawn from a generator seeded with its index in
/// the replay buffer, so a transition keeps its mask while it is stored.
#[derive(Debug, Clone)]
pub struct BootstrapMask {
    mask_prob: f64,
    seed: u64,
}

impl BootstrapMask {
    pub fn new(mask_prob: f64, seed: u64) -> Self {
        Self { mask_prob, seed }
    }

    /// Masks of the shape `[batch_size, n_heads]`, flattened.
    ///
    /// Without buffer indices, masks are drawn from `rng`.
    pub fn masks(
        &self,
        ixs: Option<&Vec<usize>>,
        batch_size: usize,
        n_heads: usize,
        rng: &mut SmallRng,
    ) -> Vec<f32> {
        if self.mask_prob >= 1.0 {
            return vec![1.0; batch_size * n_heads];
        }

        match ixs {
            Some(ixs) => ixs
                .iter()
                .flat_map(|&ix| {
                    let mut rng = SmallRng::seed_from_u64(self.seed.wrapping_add(ix as u64));
                    (0..n_heads)
                        .map(|_| self.draw(&mut rng))
                        .collect::<Vec<_>>()
                })
                .collect(),
            None => (0..batch_size * n_heads).map(|_| self.draw(rng)).collect(),
        }
    }

    fn draw(&self, rng: &mut SmallRng) -> f32 {
        (rng.gen::<f64>() < self.mask_prob) as i32 as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_are_fixed_per_transition() {
        let mask = BootstrapMask::new(0.5, 7);
        let mut rng = SmallRng::seed_from_u64(0);
        let m1 = mask.masks(Some(&vec![3, 5]), 2, 16, &mut rng);
        let m2 = mask.masks(Some(&vec![5, 3]), 2, 16, &mut rng);
        assert_eq!(&m1[..16], &m2[16..]);
        assert_eq!(&m1[16..], &m2[..16]);
        assert!(m1.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_mask_prob_one() {
        let mask = BootstrapMask::new(1.0, 7);
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(mask.masks(None, 2, 3, &mut rng), vec![1.0; 6]);
    }
}

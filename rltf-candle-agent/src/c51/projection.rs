/// Projects the distribution `r + discount * z` onto the support `z`.
///
/// `p` is the probability of each atom of `z`, which has `p.len()` atoms evenly
/// spaced in `[v_min, v_max]`. Mass moved out of the support is clipped to its ends.
pub fn categorical_projection(p: &[f32], reward: f32, discount: f32, v_min: f32, v_max: f32) -> Vec<f32> {
    let n_atoms = p.len();
    let mut m = vec![0f32; n_atoms];
    if n_atoms == 1 {
        m[0] = p[0];
        return m;
    }

    let dz = (v_max - v_min) / (n_atoms - 1) as f32;
    for (j, &p_j) in p.iter().enumerate() {
        let z_j = v_min + dz * j as f32;
        let tz = (reward + discount * z_j).max(v_min).min(v_max);
        let b = (tz - v_min) / dz;
        let l = (b.floor() as usize).min(n_atoms - 1);
        let u = (b.ceil() as usize).min(n_atoms - 1);
        if l == u {
            m[l] += p_j;
        } else {
            m[l] += p_j * (u as f32 - b);
            m[u] += p_j * (b - l as f32);
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_splits_mass() {
        let m = categorical_projection(&[0.0, 1.0, 0.0], 0.5, 1.0, -1.0, 1.0);
        assert_eq!(m, vec![0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_projection_clips_to_support() {
        let m = categorical_projection(&[0.2, 0.3, 0.5], 2.0, 0.0, -1.0, 1.0);
        assert_eq!(&m[..2], &[0.0, 0.0]);
        assert!((m[2] - 1.0).abs() < 1e-6);

        let m = categorical_projection(&[0.2, 0.3, 0.5], 0.0, 0.5, -1.0, 1.0);
        assert!((m.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        // -0.5 splits atom 0, 0.5 splits atom 2.
        assert!((m[0] - 0.1).abs() < 1e-6);
        assert!((m[1] - 0.1 - 0.3 - 0.25).abs() < 1e-6);
        assert!((m[2] - 0.25).abs() < 1e-6);
    }
}

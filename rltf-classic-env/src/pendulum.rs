//! Inverted pendulum swing-up.
use crate::{ClassicAct, ClassicObs};
use anyhow::{bail, Result};
use log::trace;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rltf_core::{error::RltfError, record::Record, Env, Step};
use serde::{Deserialize, Serialize};
use std::{
    f32::consts::PI,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

const MAX_SPEED: f32 = 8.0;
const GRAVITY: f32 = 10.0;
const MASS: f32 = 1.0;
const LENGTH: f32 = 1.0;
const DT: f32 = 0.05;

/// Configuration of [`Pendulum`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PendulumConfig {
    /// Episodes are truncated after this number of steps.
    pub max_steps: usize,

    /// Torque applied for the action `1`.
    pub max_torque: f32,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            max_steps: 200,
            max_torque: 2.0,
        }
    }
}

impl PendulumConfig {
    /// Sets the maximum length of episodes.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the maximum torque.
    pub fn max_torque(mut self, v: f32) -> Self {
        self.max_torque = v;
        self
    }

    /// Loads [`PendulumConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PendulumConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

fn normalize_angle(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

/// A pendulum to be swung up and kept upright.
///
/// The action is a torque in `[-1, 1]`, scaled by `max_torque`; values outside
/// the range are clipped. The reward is the negative cost
/// `theta^2 + 0.1 * theta_dot^2 + 0.001 * u^2`, where `theta` is zero at the
/// upright position. Episodes never terminate and are truncated after
/// `max_steps` steps.
///
/// The observation is `[cos(theta), sin(theta), theta_dot]`.
pub struct Pendulum {
    max_steps: usize,
    max_torque: f32,
    theta: f32,
    theta_dot: f32,
    t: usize,
    done: bool,
    rng: SmallRng,
}

impl Pendulum {
    fn obs(&self) -> Result<ClassicObs> {
        ClassicObs::from_slice(&[self.theta.cos(), self.theta.sin(), self.theta_dot])
    }
}

impl Env for Pendulum {
    type Config = PendulumConfig;
    type Obs = ClassicObs;
    type Act = ClassicAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let mut env = Self {
            max_steps: config.max_steps,
            max_torque: config.max_torque,
            theta: 0.0,
            theta_dot: 0.0,
            t: 0,
            done: false,
            rng: SmallRng::seed_from_u64(seed as u64),
        };
        env.reset(None)?;
        Ok(env)
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        if self.done {
            return Err(RltfError::ResetNeeded("Pendulum episode has ended".into()).into());
        }

        let u = match a.to_continuous()?.as_slice() {
            [u] => (*u).clamp(-1.0, 1.0) * self.max_torque,
            a => bail!("Pendulum takes a single torque, got {:?}", a),
        };
        let th = normalize_angle(self.theta);
        let cost = th * th + 0.1 * self.theta_dot * self.theta_dot + 0.001 * u * u;

        let theta_dot = self.theta_dot
            + (3.0 * GRAVITY / (2.0 * LENGTH) * self.theta.sin()
                + 3.0 / (MASS * LENGTH * LENGTH) * u)
                * DT;
        self.theta_dot = theta_dot.clamp(-MAX_SPEED, MAX_SPEED);
        self.theta += self.theta_dot * DT;
        self.t += 1;

        let is_truncated = self.t >= self.max_steps;
        self.done = is_truncated;
        trace!(
            "Pendulum t={} theta={} theta_dot={}",
            self.t,
            self.theta,
            self.theta_dot
        );

        let step = Step::new(
            self.obs()?,
            a.clone(),
            vec![-cost],
            vec![0],
            vec![is_truncated as i8],
            (),
            None,
        );
        Ok((step, Record::empty()))
    }

    fn reset(&mut self, is_done: Option<&Vec<i8>>) -> Result<Self::Obs> {
        if let Some(is_done) = is_done {
            if is_done.first() != Some(&1) {
                return self.obs();
            }
        }

        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.t = 0;
        self.done = false;
        self.obs()
    }

    /// Reseeds the random number generator with `ix` before resetting.
    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.rng = SmallRng::seed_from_u64(ix as u64);
        self.reset(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_episode() -> Result<()> {
        let mut env = Pendulum::build(&PendulumConfig::default(), 0)?;
        let obs = env.reset(None)?.to_vec()?;
        assert_eq!(obs.len(), 3);
        assert!((obs[0] * obs[0] + obs[1] * obs[1] - 1.0).abs() < 1e-5);

        let a = ClassicAct::continuous(&[5.0])?;
        for t in 1..=200 {
            let (step, _) = env.step(&a)?;
            assert!(step.reward[0] <= 0.0);
            assert_eq!(step.is_terminated, vec![0]);
            assert_eq!(step.is_truncated, vec![(t == 200) as i8]);
            let theta_dot = step.obs.to_vec()?[2];
            assert!(theta_dot.abs() <= MAX_SPEED);
        }
        assert!(env.step(&a).is_err());
        Ok(())
    }

    #[test]
    fn test_upright_has_zero_cost() -> Result<()> {
        let mut env = Pendulum::build(&PendulumConfig::default(), 0)?;
        env.theta = 0.0;
        env.theta_dot = 0.0;
        let (step, _) = env.step(&ClassicAct::continuous(&[0.0])?)?;
        assert_eq!(step.reward, vec![0.0]);
        Ok(())
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(2.0 * PI + 0.5) - 0.5).abs() < 1e-5);
        assert!((normalize_angle(-0.5) + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_config_serde() -> Result<()> {
        let config = PendulumConfig::default().max_torque(1.5);
        let dir = TempDir::new("pendulum_config")?;
        let path = dir.path().join("pendulum_config.yaml");
        config.save(&path)?;
        assert_eq!(PendulumConfig::load(&path)?, config);
        Ok(())
    }
}

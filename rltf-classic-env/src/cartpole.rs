//! Cart-pole balancing.
use crate::{ClassicAct, ClassicObs};
use anyhow::{bail, Result};
use log::trace;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rltf_core::{error::RltfError, record::Record, Env, Step};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

const GRAVITY: f32 = 9.8;
const MASS_CART: f32 = 1.0;
const MASS_POLE: f32 = 0.1;
const HALF_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * 2.0 * std::f32::consts::PI / 360.0;

/// Configuration of [`CartPole`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CartPoleConfig {
    /// Episodes are truncated after this number of steps.
    pub max_steps: usize,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self { max_steps: 500 }
    }
}

impl CartPoleConfig {
    /// Sets the maximum length of episodes.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Loads [`CartPoleConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CartPoleConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A pole attached to a cart moving along a frictionless track.
///
/// Actions are `0` (push left) and `1` (push right). The reward is `1` for
/// every step. An episode terminates when the pole falls over or the cart
/// leaves the track, and it is truncated after `max_steps` steps.
///
/// The observation is `[x, x_dot, theta, theta_dot]`.
pub struct CartPole {
    max_steps: usize,
    state: [f32; 4],
    t: usize,
    done: bool,
    rng: SmallRng,
}

impl CartPole {
    fn obs(&self) -> Result<ClassicObs> {
        ClassicObs::from_slice(&self.state)
    }

    fn dynamics(&mut self, force: f32) {
        let [x, x_dot, theta, theta_dot] = self.state;
        let total_mass = MASS_CART + MASS_POLE;
        let pole_mass_length = MASS_POLE * HALF_LENGTH;
        let (sin, cos) = theta.sin_cos();

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin) / total_mass;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (HALF_LENGTH * (4.0 / 3.0 - MASS_POLE * cos * cos / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos / total_mass;

        self.state = [
            x + DT * x_dot,
            x_dot + DT * x_acc,
            theta + DT * theta_dot,
            theta_dot + DT * theta_acc,
        ];
    }

    fn is_failed(&self) -> bool {
        let [x, _, theta, _] = self.state;
        x.abs() > X_THRESHOLD || theta.abs() > THETA_THRESHOLD
    }
}

impl Env for CartPole {
    type Config = CartPoleConfig;
    type Obs = ClassicObs;
    type Act = ClassicAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let mut env = Self {
            max_steps: config.max_steps,
            state: [0.0; 4],
            t: 0,
            done: false,
            rng: SmallRng::seed_from_u64(seed as u64),
        };
        env.reset(None)?;
        Ok(env)
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        if self.done {
            return Err(RltfError::ResetNeeded("CartPole episode has ended".into()).into());
        }

        let force = match a.to_discrete()? {
            0 => -FORCE_MAG,
            1 => FORCE_MAG,
            a => bail!("Invalid action {} for CartPole", a),
        };
        self.dynamics(force);
        self.t += 1;

        let is_terminated = self.is_failed();
        let is_truncated = !is_terminated && self.t >= self.max_steps;
        self.done = is_terminated || is_truncated;
        trace!("CartPole t={} state={:?}", self.t, self.state);

        let step = Step::new(
            self.obs()?,
            a.clone(),
            vec![1.0],
            vec![is_terminated as i8],
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

        for v in self.state.iter_mut() {
            *v = self.rng.gen_range(-0.05..0.05);
        }
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

    fn run(env: &mut CartPole, act: i64) -> Result<(usize, Step<CartPole>)> {
        let a = ClassicAct::discrete(act)?;
        let mut n = 0;
        loop {
            let (step, _) = env.step(&a)?;
            n += 1;
            if step.is_done() {
                return Ok((n, step));
            }
        }
    }

    #[test]
    fn test_reset() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default(), 0)?;
        let obs = env.reset(None)?;
        assert_eq!(obs.0.dims(), &[1, 4]);
        assert!(obs.to_vec()?.iter().all(|v| v.abs() <= 0.05));
        Ok(())
    }

    #[test]
    fn test_pole_falls_when_pushed_one_way() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default(), 0)?;
        let (n, step) = run(&mut env, 1)?;
        assert!(n < 100);
        assert_eq!(step.is_terminated, vec![1]);
        assert_eq!(step.is_truncated, vec![0]);
        assert_eq!(step.reward, vec![1.0]);

        // Stepping a finished episode is an error.
        let err = env.step(&ClassicAct::discrete(0)?).err();
        assert!(err.map_or(false, |e| e.downcast_ref::<RltfError>().is_some()));
        Ok(())
    }

    #[test]
    fn test_truncation() -> Result<()> {
        let config = CartPoleConfig::default().max_steps(3);
        let mut env = CartPole::build(&config, 0)?;
        let (n, step) = run(&mut env, 0)?;
        assert_eq!(n, 3);
        assert_eq!(step.is_terminated, vec![0]);
        assert_eq!(step.is_truncated, vec![1]);
        Ok(())
    }

    #[test]
    fn test_reset_with_index_is_reproducible() -> Result<()> {
        let mut env1 = CartPole::build(&CartPoleConfig::default(), 1)?;
        let mut env2 = CartPole::build(&CartPoleConfig::default(), 2)?;
        let obs1 = env1.reset_with_index(5)?.to_vec()?;
        let obs2 = env2.reset_with_index(5)?.to_vec()?;
        assert_eq!(obs1, obs2);
        Ok(())
    }

    #[test]
    fn test_invalid_action() -> Result<()> {
        let mut env = CartPole::build(&CartPoleConfig::default(), 0)?;
        assert!(env.step(&ClassicAct::discrete(2)?).is_err());
        Ok(())
    }

    #[test]
    fn test_config_serde() -> Result<()> {
        let config = CartPoleConfig::default().max_steps(200);
        let dir = TempDir::new("cartpole_config")?;
        let path = dir.path().join("cartpole_config.yaml");
        config.save(&path)?;
        assert_eq!(CartPoleConfig::load(&path)?, config);
        Ok(())
    }
}

use super::Evaluator;
use crate::{
    record::{Record, RecordValue},
    Env, Policy,
};
use anyhow::Result;

/// Runs `n_episodes` episodes and records the mean of their returns
/// as `"eval_reward"`.
///
/// Episodes start with [`Env::reset_with_index`], so that evaluation runs
/// are comparable with each other.
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<Record>
    where
        P: Policy<E>,
    {
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let mut prev_obs = self.env.reset_with_index(ix)?;
            policy.reset();

            loop {
                let act = policy.sample(&prev_obs)?;
                let (step, _) = self.env.step(&act)?;
                r_total += step.reward[0];
                if step.is_done() {
                    break;
                }
                prev_obs = step.obs;
            }
        }

        Ok(Record::from_slice(&[(
            "eval_reward",
            RecordValue::Scalar(r_total / self.n_episodes as f32),
        )]))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs an evaluator.
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }

    /// Returns the environment used for evaluation.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Returns a mutable reference to the environment used for evaluation.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{DummyAgent, DummyEnv};

    #[test]
    fn test_default_evaluator() -> Result<()> {
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&7, 0, 3)?;
        let mut agent = DummyAgent::default();
        let record = evaluator.evaluate(&mut agent)?;

        assert_eq!(record.get_scalar("eval_reward")?, 7.0);
        assert_eq!(agent.n_resets, 3);
        Ok(())
    }
}

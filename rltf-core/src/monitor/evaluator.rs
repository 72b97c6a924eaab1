use super::{Monitor, MonitorConfig, MonitorMode};
use crate::{
    evaluator::{DefaultEvaluator, Evaluator},
    record::Record,
    Env, Policy,
};
use anyhow::Result;

/// Evaluates a policy on a [`Monitor`] in [`MonitorMode::Eval`].
///
/// After every evaluation run, the statistics of the monitor are logged and
/// its `eval/*` entries are added to the returned record, together with
/// `"eval_reward"` of [`DefaultEvaluator`].
pub struct MonitoredEvaluator<E: Env> {
    evaluator: DefaultEvaluator<Monitor<E>>,
}

impl<E: Env> MonitoredEvaluator<E> {
    /// Constructs an evaluator. The monitor is switched to [`MonitorMode::Eval`].
    pub fn new(config: &MonitorConfig<E::Config>, seed: i64, n_episodes: usize) -> Result<Self> {
        let mut evaluator = DefaultEvaluator::<Monitor<E>>::new(config, seed, n_episodes)?;
        if evaluator.env().mode() != MonitorMode::Eval {
            evaluator.env_mut().set_mode(MonitorMode::Eval);
        }
        Ok(Self { evaluator })
    }

    /// Returns the monitor used for evaluation.
    pub fn monitor(&self) -> &Monitor<E> {
        self.evaluator.env()
    }
}

impl<E: Env> Evaluator<Monitor<E>> for MonitoredEvaluator<E> {
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<Record>
    where
        P: Policy<Monitor<E>>,
    {
        let mut record = self.evaluator.evaluate(policy)?;
        let monitor = self.evaluator.env_mut();
        let t = monitor.total_steps(MonitorMode::Eval);

        for (k, v) in monitor.log_stats(t).into_iter_in_record() {
            if k.starts_with("eval/") {
                record.insert(k, v);
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{DummyAct, DummyEnv, DummyObs};
    use tempdir::TempDir;

    struct Constant;

    impl Policy<Monitor<DummyEnv>> for Constant {
        fn sample(&mut self, _obs: &DummyObs) -> Result<DummyAct> {
            Ok(DummyAct(0.0))
        }
    }

    #[test]
    fn test_eval_stats_in_record() -> Result<()> {
        let dir = TempDir::new("monitored_evaluator")?;
        let log_dir = dir.path().join("eval");
        let config = MonitorConfig::new(3usize, log_dir.to_str().unwrap(), MonitorMode::Train);
        let mut evaluator = MonitoredEvaluator::<DummyEnv>::new(&config, 0, 2)?;
        assert_eq!(evaluator.monitor().mode(), MonitorMode::Eval);

        let record = evaluator.evaluate(&mut Constant)?;
        assert_eq!(record.get_scalar("eval_reward")?, 3.0);
        assert_eq!(record.get_scalar("eval/mean_ep_rew")?, 3.0);
        assert_eq!(record.get_scalar("eval/episodes")?, 2.0);
        assert_eq!(record.get_scalar("eval/steps")?, 6.0);
        assert!(record.get_scalar("agent_step").is_err());

        // Each run reports its own episodes.
        let record = evaluator.evaluate(&mut Constant)?;
        assert_eq!(record.get_scalar("eval/episodes")?, 4.0);
        assert_eq!(evaluator.monitor().episode_rewards(MonitorMode::Eval), &[3.0; 4]);
        Ok(())
    }
}

//! Evaluate a policy.
use crate::{record::Record, Env, Policy};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluate a policy.
pub trait Evaluator<E: Env> {
    /// Evaluate the policy.
    ///
    /// The returned record has the `"eval_reward"` key.
    /// The caller of this method needs to handle the internal state of the policy,
    /// like training/evaluation mode.
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<Record>
    where
        P: Policy<E>;
}

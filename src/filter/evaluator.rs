//! Policy evaluation.
//!
//! # Responsibilities
//! - Walk rule sets in configured order
//! - Return the action of the first fully matching rule set
//! - Fall back to Allow when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction; shared across requests via `Arc`
//! - First match wins: later rule sets are never evaluated
//! - Errors stop evaluation and are returned as-is; fail-open is the
//!   caller's decision

use thiserror::Error;

use crate::filter::matcher::MatchError;
use crate::filter::request::RequestView;
use crate::filter::ruleset::{Action, RuleSet};

/// Action applied when no rule set matches.
pub const DEFAULT_ACTION: Action = Action::Allow;

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    /// Index of the matching rule set, or `None` when the default applied.
    pub ruleset: Option<usize>,
}

impl Verdict {
    fn default_action() -> Self {
        Self {
            action: DEFAULT_ACTION,
            ruleset: None,
        }
    }
}

/// A matcher failure located within the policy.
#[derive(Debug, Error)]
#[error("test request: ruleset #{ruleset}, matcher #{matcher}: {source}")]
pub struct EvalError {
    pub ruleset: usize,
    pub matcher: usize,
    #[source]
    pub source: MatchError,
}

/// An ordered list of rule sets.
#[derive(Debug, Default)]
pub struct Policy {
    rulesets: Vec<RuleSet>,
}

impl Policy {
    pub fn new(rulesets: Vec<RuleSet>) -> Self {
        Self { rulesets }
    }

    pub fn rulesets(&self) -> &[RuleSet] {
        &self.rulesets
    }

    pub fn len(&self) -> usize {
        self.rulesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }

    /// Decide what to do with a request.
    pub async fn evaluate(&self, req: &mut RequestView) -> Result<Verdict, EvalError> {
        for (idx, ruleset) in self.rulesets.iter().enumerate() {
            let matched = ruleset.matches(req).await.map_err(|e| EvalError {
                ruleset: idx,
                matcher: e.matcher,
                source: e.source,
            })?;

            if matched {
                tracing::trace!(ruleset = idx, action = %ruleset.action(), "ruleset matched");
                return Ok(Verdict {
                    action: ruleset.action(),
                    ruleset: Some(idx),
                });
            }
        }

        Ok(Verdict::default_action())
    }
}

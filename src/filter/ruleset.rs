//! Rule sets: AND-combined matchers paired with an action.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::filter::matcher::{MatchError, Matcher, RuleError};
use crate::filter::request::RequestView;

/// What to do with a request once a rule set matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected action type: {0:?}")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    /// Parses `allow` or `deny`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("allow"),
            Action::Deny => f.write_str("deny"),
        }
    }
}

/// A matcher failure, tagged with the matcher's position in its rule set.
#[derive(Debug, Error)]
#[error("matcher #{matcher}: {source}")]
pub struct RuleSetError {
    pub matcher: usize,
    #[source]
    pub source: MatchError,
}

/// An ordered, non-empty group of matchers and the action they trigger.
#[derive(Debug)]
pub struct RuleSet {
    action: Action,
    matchers: Vec<Box<dyn Matcher>>,
}

impl RuleSet {
    pub fn new(action: Action, matchers: Vec<Box<dyn Matcher>>) -> Result<Self, RuleError> {
        if matchers.is_empty() {
            return Err(RuleError::EmptyRuleSet);
        }
        Ok(Self { action, matchers })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Number of matchers; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Returns true if every matcher matches.
    ///
    /// Matchers run in order; evaluation stops at the first non-match or
    /// the first error.
    pub async fn matches(&self, req: &mut RequestView) -> Result<bool, RuleSetError> {
        for (idx, matcher) in self.matchers.iter().enumerate() {
            let matched = matcher
                .test(req)
                .await
                .map_err(|source| RuleSetError { matcher: idx, source })?;
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

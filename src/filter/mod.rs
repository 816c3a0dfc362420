//! Request classification subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers, peer, body stream)
//!     → request.rs (RequestView: lazy, read-once body)
//!     → evaluator.rs (walk rule sets in order)
//!     → ruleset.rs (AND over matchers, short-circuit)
//!     → matcher.rs / activity.rs (individual conditions)
//!     → Return: Verdict (Allow | Deny, matching rule set) or EvalError
//!
//! Policy Compilation (at startup):
//!     policy document
//!     → config::loader (parse + validate)
//!     → Vec<RuleSet>
//!     → Freeze as immutable Policy
//! ```
//!
//! # Design Decisions
//! - Policy is built once and never mutated (shared without locks)
//! - First match wins; no match means Allow
//! - Matcher errors propagate untouched; the HTTP layer fails open

pub mod activity;
pub mod cidr;
pub mod evaluator;
pub mod matcher;
pub mod request;
pub mod ruleset;

pub use activity::{ActorMatcher, MentionCountMatcher, NoteContentMatcher};
pub use cidr::CidrBlock;
pub use evaluator::{EvalError, Policy, Verdict};
pub use matcher::{MatchError, Matcher, RemoteIpMatcher, RuleError, UserAgentMatcher};
pub use request::{BodyError, RequestView};
pub use ruleset::{Action, RuleSet};

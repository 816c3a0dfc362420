//! Matchers that inspect federated activity payloads.
//!
//! # Responsibilities
//! - Parse the buffered body as an activity document
//! - Match note content, mention counts and actor prefixes
//!
//! # Design Decisions
//! - Only inbox paths are inspected; other paths are "no match" and the
//!   body is left untouched
//! - Malformed JSON is an error, never a silent non-match; so is a
//!   document that is valid JSON but not an object
//! - Shape variants of valid activities (linked objects, a single tag
//!   instead of a list, actor objects) are tolerated and simply don't match

use futures_util::future::BoxFuture;
use serde::de::{DeserializeOwned, Error as _, IgnoredAny};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::filter::matcher::{MatchError, Matcher, RuleError};
use crate::filter::request::RequestView;

const CREATE: &str = "Create";
const NOTE: &str = "Note";
const QUESTION: &str = "Question";
const MENTION: &str = "Mention";

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    actor: Option<ActorRef>,
    #[serde(default)]
    object: Option<ObjectRef>,
}

/// A `T` read only from a JSON object.
///
/// Derived struct impls also accept arrays and fill fields by position.
#[derive(Debug)]
struct JsonObject<T>(T);

impl<'de, T: DeserializeOwned> Deserialize<'de> for JsonObject<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        serde_json::from_value(Value::Object(fields))
            .map(JsonObject)
            .map_err(D::Error::custom)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActorRef {
    Id(String),
    Object(JsonObject<ActorObject>),
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct ActorObject {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ObjectRef {
    Embedded(JsonObject<ActivityObject>),
    // Bare links and anything else a Note can't be.
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct ActivityObject {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tag: Option<OneOrMany<JsonObject<Tag>>>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl Activity {
    async fn from_request(req: &mut RequestView) -> Result<Self, MatchError> {
        let body = req.body().await?;
        let JsonObject(activity) = serde_json::from_slice(body)?;
        Ok(activity)
    }

    fn actor_id(&self) -> Option<&str> {
        match self.actor.as_ref()? {
            ActorRef::Id(id) => Some(id.as_str()),
            ActorRef::Object(JsonObject(actor)) => Some(actor.id.as_str()),
            ActorRef::Other(_) => None,
        }
    }

    /// The embedded object of a `Create` activity, if its type is one of `kinds`.
    fn created(&self, kinds: &[&str]) -> Option<&ActivityObject> {
        if self.kind.as_deref() != Some(CREATE) {
            return None;
        }
        match self.object.as_ref()? {
            ObjectRef::Embedded(JsonObject(object))
                if object.kind.as_deref().is_some_and(|k| kinds.contains(&k)) =>
            {
                Some(object)
            }
            _ => None,
        }
    }
}

impl ActivityObject {
    fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    fn mention_count(&self) -> usize {
        let is_mention = |JsonObject(tag): &JsonObject<Tag>| tag.kind.as_deref() == Some(MENTION);
        match &self.tag {
            Some(OneOrMany::Many(tags)) => tags.iter().filter(|&t| is_mention(t)).count(),
            Some(OneOrMany::One(tag)) => usize::from(is_mention(tag)),
            None => 0,
        }
    }
}

/// Matches `Create` activities whose Note or Question content contains a pattern.
#[derive(Debug, Clone)]
pub struct NoteContentMatcher {
    pattern: String,
}

impl NoteContentMatcher {
    pub fn new(pattern: impl Into<String>) -> Result<Self, RuleError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(RuleError::EmptyPattern("note content"));
        }
        Ok(Self { pattern })
    }
}

impl Matcher for NoteContentMatcher {
    fn test<'a>(&'a self, req: &'a mut RequestView) -> BoxFuture<'a, Result<bool, MatchError>> {
        Box::pin(async move {
            if !req.is_inbox() {
                return Ok(false);
            }
            let activity = Activity::from_request(req).await?;
            Ok(activity
                .created(&[NOTE, QUESTION])
                .is_some_and(|note| note.content().contains(&self.pattern)))
        })
    }
}

/// Matches `Create` Note activities carrying more than `more_than` mentions.
#[derive(Debug, Clone)]
pub struct MentionCountMatcher {
    more_than: usize,
}

impl MentionCountMatcher {
    pub fn new(more_than: i64) -> Result<Self, RuleError> {
        let more_than = usize::try_from(more_than).map_err(|_| RuleError::NegativeThreshold(more_than))?;
        Ok(Self { more_than })
    }
}

impl Matcher for MentionCountMatcher {
    fn test<'a>(&'a self, req: &'a mut RequestView) -> BoxFuture<'a, Result<bool, MatchError>> {
        Box::pin(async move {
            if !req.is_inbox() {
                return Ok(false);
            }
            let activity = Activity::from_request(req).await?;
            Ok(activity
                .created(&[NOTE])
                .is_some_and(|note| note.mention_count() > self.more_than))
        })
    }
}

/// Matches activities whose `actor` starts with a prefix.
#[derive(Debug, Clone)]
pub struct ActorMatcher {
    prefix: String,
}

impl ActorMatcher {
    pub fn new(prefix: impl Into<String>) -> Result<Self, RuleError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(RuleError::EmptyPattern("actor prefix"));
        }
        Ok(Self { prefix })
    }
}

impl Matcher for ActorMatcher {
    fn test<'a>(&'a self, req: &'a mut RequestView) -> BoxFuture<'a, Result<bool, MatchError>> {
        Box::pin(async move {
            if !req.is_inbox() {
                return Ok(false);
            }
            let activity = Activity::from_request(req).await?;
            Ok(activity
                .actor_id()
                .is_some_and(|actor| actor.starts_with(&self.prefix)))
        })
    }
}

//! Policy loading from disk.
//!
//! Turns a policy document into an immutable [`Policy`]. Every check that
//! can fail happens here, so a process that starts never serves traffic
//! with a half-valid policy.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{PolicyDocument, RuleConfig, RuleSetConfig};
use crate::config::validation::ValidationError;
use crate::filter::ruleset::ParseActionError;
use crate::filter::{
    Action, ActorMatcher, Matcher, MentionCountMatcher, NoteContentMatcher, Policy,
    RemoteIpMatcher, RuleError, RuleSet, UserAgentMatcher,
};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unmarshal yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unmarshal toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("ruleset #{ruleset}: {source}")]
    Action {
        ruleset: usize,
        #[source]
        source: ParseActionError,
    },

    #[error("ruleset #{ruleset}: empty matchers in ruleset")]
    EmptyRuleSet { ruleset: usize },

    #[error("ruleset #{ruleset}, rule #{rule}: no matcher resolved for source {source_name:?}")]
    UnknownSource {
        ruleset: usize,
        rule: usize,
        source_name: String,
    },

    #[error("ruleset #{ruleset}, rule #{rule}: {source}")]
    Rule {
        ruleset: usize,
        rule: usize,
        #[source]
        source: RuleError,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and build a policy file.
///
/// Files ending in `.toml` are parsed as TOML, everything else as YAML.
pub fn load_policy(path: &Path) -> Result<Policy, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        parse_policy_toml(&content)
    } else {
        parse_policy_yaml(&content)
    }
}

pub fn parse_policy_yaml(content: &str) -> Result<Policy, ConfigError> {
    // An empty file deserializes as YAML null.
    let document: Option<PolicyDocument> = serde_yaml::from_str(content)?;
    build_policy(document.unwrap_or_default())
}

pub fn parse_policy_toml(content: &str) -> Result<Policy, ConfigError> {
    let document: PolicyDocument = toml::from_str(content)?;
    build_policy(document)
}

/// Build a policy from a parsed document.
pub fn build_policy(document: PolicyDocument) -> Result<Policy, ConfigError> {
    let rulesets = document
        .rulesets
        .iter()
        .enumerate()
        .map(|(idx, config)| build_ruleset(idx, config))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Policy::new(rulesets))
}

fn build_ruleset(idx: usize, config: &RuleSetConfig) -> Result<RuleSet, ConfigError> {
    let action: Action = config
        .action
        .parse()
        .map_err(|source| ConfigError::Action { ruleset: idx, source })?;

    if config.rules.is_empty() {
        return Err(ConfigError::EmptyRuleSet { ruleset: idx });
    }

    let matchers = config
        .rules
        .iter()
        .enumerate()
        .map(|(rule_idx, rule)| build_matcher(idx, rule_idx, rule))
        .collect::<Result<Vec<_>, _>>()?;

    RuleSet::new(action, matchers).map_err(|_| ConfigError::EmptyRuleSet { ruleset: idx })
}

fn build_matcher(ruleset: usize, rule: usize, config: &RuleConfig) -> Result<Box<dyn Matcher>, ConfigError> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let wrap = |source: RuleError| ConfigError::Rule { ruleset, rule, source };

    let matcher: Box<dyn Matcher> = match config.source.to_ascii_lowercase().as_str() {
        "note_body" => Box::new(NoteContentMatcher::new(text(&config.contains)).map_err(wrap)?),
        "mention_count" => Box::new(MentionCountMatcher::new(config.more_than.unwrap_or(0)).map_err(wrap)?),
        "actor" => Box::new(ActorMatcher::new(text(&config.starts_with)).map_err(wrap)?),
        "user_agent" | "useragent" => Box::new(UserAgentMatcher::new(text(&config.contains)).map_err(wrap)?),
        "remote_ip" => {
            // `contains` is the older spelling of `cidr`.
            let block = config.cidr.as_ref().or(config.contains.as_ref());
            Box::new(RemoteIpMatcher::new(block.map_or("", String::as_str)).map_err(wrap)?)
        }
        _ => {
            return Err(ConfigError::UnknownSource {
                ruleset,
                rule,
                source_name: config.source.clone(),
            })
        }
    };
    Ok(matcher)
}

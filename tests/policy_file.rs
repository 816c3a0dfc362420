//! Loading policy files from disk.

use std::fs;
use std::path::PathBuf;

use inbox_shield::config::{load_policy, ConfigError};
use inbox_shield::Action;

fn write_temp(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("inbox-shield-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_loads_yaml_policy() {
    let path = write_temp(
        "rules.yaml",
        "rulesets:\n  - action: Deny\n    rules:\n      - source: note_body\n        contains: spam\n      - source: mention_count\n        more_than: 3\n",
    );

    let policy = load_policy(&path).unwrap();
    assert_eq!(policy.len(), 1);
    assert_eq!(policy.rulesets()[0].action(), Action::Deny);
    assert_eq!(policy.rulesets()[0].len(), 2);
}

#[test]
fn test_loads_toml_policy_by_extension() {
    let path = write_temp(
        "rules.toml",
        "[[rulesets]]\naction = \"allow\"\n\n[[rulesets.rules]]\nsource = \"remote_ip\"\ncidr = \"2001:db8::/32\"\n",
    );

    let policy = load_policy(&path).unwrap();
    assert_eq!(policy.rulesets()[0].action(), Action::Allow);
}

#[test]
fn test_bad_policy_reports_location() {
    let path = write_temp(
        "broken.yaml",
        "rulesets:\n  - action: deny\n    rules:\n      - source: actor\n        starts_with: https://a\n  - action: deny\n    rules:\n      - source: headers\n",
    );

    let err = load_policy(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownSource { ruleset: 1, rule: 0, .. }));
    assert!(err.to_string().contains("ruleset #1"));
}

#[test]
fn test_sample_policy_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rules.example.yaml");
    let policy = load_policy(&path).unwrap();
    assert!(!policy.is_empty());
}

use arc_readiness::{config::Config, policy::PollPolicy, resource::ResourceKind};
use std::time::Duration;

#[test]
fn parse_example_config() {
    let raw = include_str!("../arc-readiness.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    cfg.validate().expect("valid config");
    assert!(cfg.polling.max_parallel_sessions >= 1);
    assert!(!cfg.paths.out_dir.is_empty());
    assert_eq!(cfg.azure.providers.len(), 6);
    assert_eq!(cfg.resources.len(), 3);
    assert_eq!(cfg.resources[0].kind, ResourceKind::KeyVault);
    assert_eq!(cfg.resources[2].max_name_attempts, 3);
}

#[test]
fn empty_config_uses_defaults() {
    let cfg: Config = toml::from_str("").expect("parse TOML");
    assert_eq!(cfg.polling.interval_seconds, 10);
    assert_eq!(cfg.polling.max_attempts, 30);
    assert!(cfg.resources.is_empty());
    assert!(cfg.validate().is_ok());
}

#[test]
fn override_applies_per_driver() {
    let raw = include_str!("../arc-readiness.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");

    let nodes = PollPolicy::from_config(&cfg, cfg.polling.nodes.as_ref()).unwrap();
    assert_eq!(nodes.interval(), Duration::from_secs(5));
    assert_eq!(nodes.max_attempts(), 60);

    let providers = PollPolicy::from_config(&cfg, cfg.polling.providers.as_ref()).unwrap();
    assert_eq!(providers.interval(), Duration::from_secs(10));
    assert_eq!(providers.timeout(), Duration::from_secs(300));
}

#[test]
fn rejects_zero_interval() {
    let cfg: Config = toml::from_str(
        r#"
[polling]
interval_seconds = 0
max_attempts = 3
timeout_seconds = 0
max_parallel_sessions = 1
"#,
    )
    .expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_bad_regex() {
    let mut cfg = Config::default();
    cfg.classification.transient_patterns.push("(unclosed".into());
    let err = cfg.validate().unwrap_err();
    assert!(format!("{err:#}").contains("transient_patterns"));
}

#[test]
fn normalized_hash_input_is_stable() {
    let cfg = Config::default();
    assert_eq!(cfg.normalized_for_hash(), cfg.clone().normalized_for_hash());
    assert!(!cfg.normalized_for_hash().is_empty());
}

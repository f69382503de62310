//! Integration tests for config module

use super::*;
use crate::autograd::BackwardStrategy;
use crate::error::Error;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_end_to_end_config_loading() {
    let yaml = r#"
context:
  training: true
  strategy: recursive
  max_recursion_depth: 8192

optimizer:
  name: sgd
  lr: 0.05
  momentum: 0.9
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();

    let config = load_config(temp_file.path()).unwrap();

    assert!(config.context.is_training());
    assert_eq!(config.context.strategy(), BackwardStrategy::Recursive);
    assert_eq!(config.context.max_recursion_depth(), 8192);

    let spec = config.optimizer.as_ref().unwrap();
    assert_eq!(spec.name, "sgd");
    assert_eq!(spec.param_or("momentum", 0.0), 0.9);

    let optimizer = build_optimizer(spec).unwrap();
    assert_eq!(optimizer.lr(), 0.05);
}

#[test]
fn test_minimal_config() {
    let yaml = r#"
context:
  training: false
"#;

    let config = parse_config(yaml).unwrap();

    // Check defaults are applied
    assert!(!config.context.is_training());
    assert_eq!(config.context.strategy(), BackwardStrategy::Iterative);
    assert_eq!(config.context.max_recursion_depth(), 4096);
    assert!(config.optimizer.is_none());
}

#[test]
fn test_empty_config_is_default() {
    assert_eq!(parse_config("").unwrap(), EngineConfig::default());
}

#[test]
fn test_zero_depth_is_config_error() {
    let err = parse_config("context:\n  max_recursion_depth: 0\n").unwrap_err();
    match err {
        Error::ConfigError(msg) => assert!(msg.contains("max_recursion_depth")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_malformed_yaml() {
    let err = parse_config("context: [unclosed").unwrap_err();
    match err {
        Error::ConfigError(msg) => assert!(msg.contains("Failed to parse")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unknown_strategy_rejected() {
    assert!(matches!(
        parse_config("context:\n  strategy: breadth_first\n"),
        Err(Error::ConfigError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_config("/nonexistent/engine.yaml").unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

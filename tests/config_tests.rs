mod common;

use std::fs;

use common::{ORDER_RULES, READWRITE_ENCRYPT_RULES};
use sqlshard::{Error, ErrorKind, RuleConfiguration, RuleSet};
use tempfile::tempdir;

#[test]
fn test_load_rules_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rules.json");
    fs::write(&path, ORDER_RULES).unwrap();

    let config = RuleConfiguration::from_file(&path).unwrap();
    assert_eq!(config.data_sources, vec!["ds_0", "ds_1"]);
    let rules = RuleSet::build(&config).unwrap();
    assert!(rules.is_sharding_table("T_ORDER"));
    assert!(rules.is_broadcast_table("t_config"));
    assert!(!rules.props().sql_show);
}

#[test]
fn test_pretty_json_round_trips_through_file() {
    let config = RuleConfiguration::from_json_str(READWRITE_ENCRYPT_RULES).unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("rules.json");
    fs::write(&path, config.to_json_pretty().unwrap()).unwrap();
    assert_eq!(RuleConfiguration::from_file(&path).unwrap(), config);
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempdir().unwrap();
    let err = RuleConfiguration::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_malformed_json_rejected() {
    let err = RuleConfiguration::from_json_str("{ \"data_sources\": [").unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[test]
fn test_unknown_data_node_source_rejected() {
    let json = ORDER_RULES.replace("ds_${0..1}.t_order_${0..2}", "ds_${0..2}.t_order_${0..2}");
    let err = RuleConfiguration::from_json_str(&json).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_unknown_algorithm_type_rejected_at_build() {
    let table_mod = r#""type": "MOD", "props": { "sharding-count": 3 }"#;
    let json = ORDER_RULES.replace(table_mod, r#""type": "NO_SUCH""#);
    let config = RuleConfiguration::from_json_str(&json).unwrap();
    let err = RuleSet::build(&config).unwrap_err();
    match err {
        Error::UnknownAlgorithmType { algorithm_type } => assert_eq!(algorithm_type, "NO_SUCH"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_properties_loaded() {
    let props = r#""props": {
    "sql_show": true, "default_data_source": "ds_1", "metrics_enabled": true
  },
  "data_sources""#;
    let json = ORDER_RULES.replacen("\"data_sources\"", props, 1);
    let config = RuleConfiguration::from_json_str(&json).unwrap();
    assert!(config.props.sql_show);
    assert!(config.props.metrics_enabled);
    assert_eq!(config.props.default_data_source.as_deref(), Some("ds_1"));
}

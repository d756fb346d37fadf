#![allow(dead_code)]

use sqlshard::{QueryContext, RuleConfiguration, RuleSet, StatementContext, Value};

/// `t_order` / `t_order_item` over `ds_0..1` x `_0..2`, databases by
/// `user_id % 2`, tables by `order_id % 3`.
pub const ORDER_RULES: &str = r#"{
  "data_sources": ["ds_0", "ds_1"],
  "sharding": {
    "tables": [
      { "logic_table": "t_order", "actual_data_nodes": "ds_${0..1}.t_order_${0..2}" },
      { "logic_table": "t_order_item", "actual_data_nodes": "ds_${0..1}.t_order_item_${0..2}" }
    ],
    "binding_tables": ["t_order, t_order_item"],
    "broadcast_tables": ["t_config"],
    "default_database_strategy": {
      "type": "standard", "sharding_column": "user_id", "algorithm_name": "database_mod"
    },
    "default_table_strategy": {
      "type": "standard", "sharding_column": "order_id", "algorithm_name": "table_mod"
    },
    "algorithms": {
      "database_mod": { "type": "MOD", "props": { "sharding-count": 2 } },
      "table_mod": { "type": "MOD", "props": { "sharding-count": 3 } }
    }
  },
  "single_tables": [{ "table": "t_user", "data_source": "ds_1" }]
}"#;

/// One logical `ds` with a shadow twin and a single table.
pub const SHADOW_RULES: &str = r#"{
  "data_sources": ["ds", "ds_shadow"],
  "single_tables": [{ "table": "t_user", "data_source": "ds" }],
  "shadow": {
    "data_sources": [{ "production_data_source": "ds", "shadow_data_source": "ds_shadow" }],
    "tables": [{ "table": "t_user", "column": "user_type", "values": [1] }]
  }
}"#;

/// Logical `ds` backed by a primary and two replicas; `t_user` encrypts `pwd`.
pub const READWRITE_ENCRYPT_RULES: &str = r#"{
  "data_sources": ["ds_primary", "ds_replica_0", "ds_replica_1"],
  "single_tables": [{ "table": "t_user", "data_source": "ds" }],
  "readwrite_splitting": {
    "groups": [{
      "name": "ds",
      "write_data_source": "ds_primary",
      "read_data_sources": ["ds_replica_0", "ds_replica_1"],
      "load_balancer": "FIRST"
    }]
  },
  "encrypt": {
    "tables": [{
      "table": "t_user",
      "columns": [{ "name": "pwd", "cipher_column": "pwd_cipher", "encryptor_name": "sha" }]
    }],
    "encryptors": { "sha": { "type": "SHA256" } }
  }
}"#;

pub fn rules(json: &str) -> RuleSet {
    let config = RuleConfiguration::from_json_str(json).expect("fixture configuration is valid");
    RuleSet::build(&config).expect("fixture rules build")
}

pub fn order_rules() -> RuleSet {
    rules(ORDER_RULES)
}

pub fn query(sql: &str, statement: StatementContext, parameters: &[Value]) -> QueryContext {
    QueryContext::new(sql, statement, parameters.to_vec())
}

/// `data_source:table,...` per unit, the way route units display.
pub fn unit_names(context: &sqlshard::RouteContext) -> Vec<String> {
    context.units().iter().map(|u| u.to_string()).collect()
}

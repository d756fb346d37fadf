//! Shared rule fixtures for unit tests.

use std::collections::BTreeMap;

use crate::config::{
    AlgorithmConfiguration, Properties, RuleConfiguration, ShardingRuleConfiguration,
    ShardingTableConfiguration, SingleTableConfiguration, StrategyConfiguration,
};
use crate::rule::RuleSet;

/// `t_order` and `t_order_item` bound together over `ds_0..1` x `_0..2`,
/// databases by `user_id % 2`, tables by `order_id % 3`. `t_config` is
/// broadcast and `t_user` lives in `ds_1`.
pub(crate) fn order_config() -> RuleConfiguration {
    let mut algorithms = BTreeMap::new();
    algorithms.insert(
        "database_mod".to_string(),
        AlgorithmConfiguration::new("MOD", Properties::new().with("sharding-count", 2)),
    );
    algorithms.insert(
        "table_mod".to_string(),
        AlgorithmConfiguration::new("MOD", Properties::new().with("sharding-count", 3)),
    );
    let table = |logic: &str| ShardingTableConfiguration {
        logic_table: logic.to_string(),
        actual_data_nodes: Some(format!("ds_${{0..1}}.{}_${{0..2}}", logic)),
        database_strategy: None,
        table_strategy: None,
    };
    RuleConfiguration {
        data_sources: vec!["ds_0".to_string(), "ds_1".to_string()],
        sharding: Some(ShardingRuleConfiguration {
            tables: vec![table("t_order"), table("t_order_item")],
            binding_tables: vec!["t_order,t_order_item".to_string()],
            broadcast_tables: vec!["t_config".to_string()],
            default_database_strategy: Some(StrategyConfiguration::standard(
                "user_id",
                "database_mod",
            )),
            default_table_strategy: Some(StrategyConfiguration::standard("order_id", "table_mod")),
            algorithms,
        }),
        single_tables: vec![SingleTableConfiguration {
            table: "t_user".to_string(),
            data_source: "ds_1".to_string(),
        }],
        ..Default::default()
    }
}

pub(crate) fn order_rules() -> RuleSet {
    RuleSet::build(&order_config()).unwrap()
}

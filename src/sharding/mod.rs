//! Sharding rule, strategies, algorithms and condition extraction.

pub mod algorithm;
pub mod condition;
pub mod rule;
pub mod strategy;
pub mod value;

pub use algorithm::{AlgorithmRegistry, ShardingAlgorithm};
pub use condition::{ShardingCondition, ShardingConditions};
pub use rule::{ShardingRule, TableRule};
pub use strategy::ShardingStrategy;
pub use value::{ConditionKind, ShardingConditionValue, ShardingRange};

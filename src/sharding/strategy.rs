use std::sync::Arc;

use tracing::debug;

use crate::datanode::DataNodeInfo;
use crate::error::{Error, Result};
use crate::names::{eq_ignore_case, NameSet};
use crate::sharding::algorithm::ShardingAlgorithm;
use crate::sharding::value::{
    ComplexShardingValue, ConditionKind, PreciseShardingValue, RangeShardingValue,
    ShardingConditionValue,
};
use crate::value::Value;

/// Sharding column(s) bound to an algorithm.
#[derive(Debug, Clone)]
pub enum ShardingStrategy {
    Standard {
        column: String,
        algorithm_name: String,
        algorithm: Arc<dyn ShardingAlgorithm>,
    },
    Complex {
        columns: Vec<String>,
        algorithm_name: String,
        algorithm: Arc<dyn ShardingAlgorithm>,
    },
    /// Every available target.
    None,
}

impl ShardingStrategy {
    pub fn sharding_columns(&self) -> Vec<&str> {
        match self {
            ShardingStrategy::Standard { column, .. } => vec![column.as_str()],
            ShardingStrategy::Complex { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
            ShardingStrategy::None => Vec::new(),
        }
    }

    pub fn is_sharding_column(&self, column: &str) -> bool {
        self.sharding_columns()
            .iter()
            .any(|c| eq_ignore_case(c, column))
    }

    /// Targets among `available` selected by `conditions` (conditions on other
    /// columns or tables are ignored). Result order follows `available`.
    ///
    /// Every name an algorithm returns must be in `available`, for list and
    /// range conditions alike.
    pub fn do_sharding(
        &self,
        table: &str,
        available: &NameSet,
        conditions: &[ShardingConditionValue],
        data_node_info: &DataNodeInfo,
    ) -> Result<Vec<String>> {
        let targets = match self {
            ShardingStrategy::None => return Ok(available.to_vec()),
            ShardingStrategy::Standard {
                column,
                algorithm_name,
                algorithm,
            } => {
                let condition = match conditions.iter().find(|c| c.is_for(table, column)) {
                    Some(condition) => condition,
                    None => return Ok(available.to_vec()),
                };
                match &condition.kind {
                    ConditionKind::List(values) => {
                        let mut targets = Vec::with_capacity(values.len());
                        for value in values {
                            let target = algorithm.do_sharding(
                                available,
                                &PreciseShardingValue {
                                    table,
                                    column,
                                    data_node_info,
                                    value,
                                },
                            )?;
                            ensure_available(
                                algorithm_name,
                                table,
                                column,
                                &value.to_string(),
                                &target,
                                available,
                            )?;
                            targets.push(target);
                        }
                        targets
                    }
                    ConditionKind::Range(range) => {
                        let targets = algorithm.do_range_sharding(
                            available,
                            &RangeShardingValue {
                                table,
                                column,
                                data_node_info,
                                range,
                            },
                        )?;
                        for target in &targets {
                            ensure_available(
                                algorithm_name,
                                table,
                                column,
                                &range.to_string(),
                                target,
                                available,
                            )?;
                        }
                        targets
                    }
                }
            }
            ShardingStrategy::Complex {
                columns,
                algorithm_name,
                algorithm,
            } => {
                let mut values: Vec<(&str, &[Value])> = Vec::new();
                let mut ranges = Vec::new();
                for column in columns {
                    if let Some(condition) = conditions.iter().find(|c| c.is_for(table, column)) {
                        match &condition.kind {
                            ConditionKind::List(list) => {
                                values.push((column.as_str(), list.as_slice()))
                            }
                            ConditionKind::Range(range) => ranges.push((column.as_str(), range)),
                        }
                    }
                }
                if values.is_empty() && ranges.is_empty() {
                    return Ok(available.to_vec());
                }
                let description = values
                    .iter()
                    .map(|(c, v)| format!("{}={:?}", c, v))
                    .chain(ranges.iter().map(|(c, r)| format!("{} in {}", c, r)))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let targets = algorithm.do_complex_sharding(
                    available,
                    &ComplexShardingValue {
                        table,
                        data_node_info,
                        values,
                        ranges,
                    },
                )?;
                for target in &targets {
                    ensure_available(
                        algorithm_name,
                        table,
                        &columns.join(","),
                        &description,
                        target,
                        available,
                    )?;
                }
                targets
            }
        };

        let selected: NameSet = targets.into_iter().collect();
        let result: Vec<String> = available
            .iter()
            .filter(|name| selected.contains(name))
            .map(str::to_string)
            .collect();
        debug!(table, targets = ?result, "sharding strategy evaluated");
        Ok(result)
    }
}

fn ensure_available(
    algorithm: &str,
    table: &str,
    column: &str,
    value: &str,
    target: &str,
    available: &NameSet,
) -> Result<()> {
    if available.contains(target) {
        return Ok(());
    }
    Err(Error::TargetNotAvailable {
        algorithm: algorithm.to_string(),
        table: table.to_string(),
        column: column.to_string(),
        value: value.to_string(),
        target: target.to_string(),
        available: available.to_vec(),
    })
}

use std::sync::Arc;

use tracing::debug;

use crate::config::{ShardingRuleConfiguration, ShardingTableConfiguration, StrategyConfiguration};
use crate::datanode::{expand_data_nodes, DataNode, DataNodeInfo};
use crate::error::{Error, Result};
use crate::names::{NameMap, NameSet};
use crate::sharding::algorithm::{AlgorithmRegistry, ShardingAlgorithm};
use crate::sharding::strategy::ShardingStrategy;

/// Layout and strategies of one logic table.
#[derive(Debug, Clone)]
pub struct TableRule {
    pub logic_table: String,
    actual_data_nodes: Vec<DataNode>,
    database_strategy: Option<ShardingStrategy>,
    table_strategy: Option<ShardingStrategy>,
    data_sources: NameSet,
    actual_tables: NameSet,
    data_source_info: DataNodeInfo,
    table_info: DataNodeInfo,
}

impl TableRule {
    fn build(
        config: &ShardingTableConfiguration,
        data_sources: &NameSet,
        algorithms: &NameMap<Arc<dyn ShardingAlgorithm>>,
    ) -> Result<Self> {
        let logic_table = config.logic_table.trim().to_string();
        let actual_data_nodes = match &config.actual_data_nodes {
            Some(expression) if !expression.trim().is_empty() => expand_data_nodes(expression)?,
            _ => data_sources
                .iter()
                .map(|ds| DataNode::new(ds, logic_table.clone()))
                .collect(),
        };
        if actual_data_nodes.is_empty() {
            return Err(Error::Config(format!("table {} has no actual data nodes", logic_table)));
        }

        let mut seen = NameSet::new();
        for node in &actual_data_nodes {
            if !seen.insert(node.to_string()) {
                return Err(Error::Config(format!(
                    "duplicate actual data node {} for table {}",
                    node, logic_table
                )));
            }
        }

        let data_sources: NameSet =
            actual_data_nodes.iter().map(|n| n.data_source.clone()).collect();
        let actual_tables: NameSet = actual_data_nodes.iter().map(|n| n.table.clone()).collect();
        let data_source_info = DataNodeInfo::for_data_sources(data_sources.iter());
        let table_info = DataNodeInfo::for_tables(&logic_table, actual_tables.iter());

        Ok(Self {
            database_strategy: build_strategy(
                &logic_table,
                config.database_strategy.as_ref(),
                algorithms,
            )?,
            table_strategy: build_strategy(
                &logic_table,
                config.table_strategy.as_ref(),
                algorithms,
            )?,
            logic_table,
            actual_data_nodes,
            data_sources,
            actual_tables,
            data_source_info,
            table_info,
        })
    }

    pub fn actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    pub fn data_source_names(&self) -> &NameSet {
        &self.data_sources
    }

    pub fn actual_tables(&self) -> &NameSet {
        &self.actual_tables
    }

    /// Actual tables present in `data_source`, in declaration order.
    pub fn actual_tables_in(&self, data_source: &str) -> NameSet {
        self.actual_data_nodes
            .iter()
            .filter(|n| n.data_source.eq_ignore_ascii_case(data_source))
            .map(|n| n.table.clone())
            .collect()
    }

    pub fn contains_data_node(&self, data_source: &str, table: &str) -> bool {
        self.actual_data_nodes.iter().any(|n| n.matches(data_source, table))
    }

    pub fn data_source_info(&self) -> &DataNodeInfo {
        &self.data_source_info
    }

    pub fn table_info(&self) -> &DataNodeInfo {
        &self.table_info
    }
}

fn build_strategy(
    table: &str,
    config: Option<&StrategyConfiguration>,
    algorithms: &NameMap<Arc<dyn ShardingAlgorithm>>,
) -> Result<Option<ShardingStrategy>> {
    let config = match config {
        Some(config) => config,
        None => return Ok(None),
    };
    let lookup = |name: &str| {
        algorithms
            .get(name)
            .cloned()
            .ok_or_else(|| Error::AlgorithmNotFound {
                name: name.to_string(),
                table: table.to_string(),
            })
    };
    let strategy = match config {
        StrategyConfiguration::None => ShardingStrategy::None,
        StrategyConfiguration::Standard {
            sharding_column,
            algorithm_name,
        } => {
            if sharding_column.trim().is_empty() {
                return Err(Error::MissingShardingColumn {
                    table: table.to_string(),
                });
            }
            ShardingStrategy::Standard {
                column: sharding_column.trim().to_string(),
                algorithm_name: algorithm_name.clone(),
                algorithm: lookup(algorithm_name)?,
            }
        }
        StrategyConfiguration::Complex {
            sharding_columns,
            algorithm_name,
        } => {
            let columns: Vec<String> = sharding_columns
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if columns.is_empty() {
                return Err(Error::MissingShardingColumn {
                    table: table.to_string(),
                });
            }
            ShardingStrategy::Complex {
                columns,
                algorithm_name: algorithm_name.clone(),
                algorithm: lookup(algorithm_name)?,
            }
        }
    };
    Ok(Some(strategy))
}

/// Immutable sharding metadata. Owns the algorithm instances it created.
#[derive(Debug, Clone)]
pub struct ShardingRule {
    tables: NameMap<TableRule>,
    binding_groups: Vec<NameSet>,
    broadcast_tables: NameSet,
    data_sources: NameSet,
    default_database_strategy: ShardingStrategy,
    default_table_strategy: ShardingStrategy,
    algorithms: NameMap<Arc<dyn ShardingAlgorithm>>,
}

impl ShardingRule {
    pub fn build(
        config: &ShardingRuleConfiguration,
        data_sources: &NameSet,
        registry: &AlgorithmRegistry,
    ) -> Result<Self> {
        let mut algorithms = NameMap::new();
        for (name, algorithm) in &config.algorithms {
            let instance = registry.create(&algorithm.algorithm_type, &algorithm.props)?;
            debug!(
                name = %name,
                algorithm_type = instance.algorithm_type(),
                "sharding algorithm created"
            );
            algorithms.insert(name.clone(), instance);
        }

        let mut tables = NameMap::new();
        for table in &config.tables {
            let rule = TableRule::build(table, data_sources, &algorithms)?;
            if tables.insert(rule.logic_table.clone(), rule).is_some() {
                return Err(Error::Config(format!(
                    "sharding table {} configured twice",
                    table.logic_table
                )));
            }
        }

        let mut binding_groups = Vec::with_capacity(config.binding_tables.len());
        for group in &config.binding_tables {
            let members: NameSet = group
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            validate_binding_group(&members, &tables)?;
            binding_groups.push(members);
        }

        let broadcast_tables: NameSet = config.broadcast_tables.iter().cloned().collect();
        for table in broadcast_tables.iter() {
            if tables.contains_key(table) {
                return Err(Error::Config(format!(
                    "table {} cannot be both sharding and broadcast",
                    table
                )));
            }
        }

        let default_database_strategy =
            build_strategy("<default>", config.default_database_strategy.as_ref(), &algorithms)?
                .unwrap_or(ShardingStrategy::None);
        let default_table_strategy =
            build_strategy("<default>", config.default_table_strategy.as_ref(), &algorithms)?
                .unwrap_or(ShardingStrategy::None);

        Ok(Self {
            tables,
            binding_groups,
            broadcast_tables,
            data_sources: data_sources.clone(),
            default_database_strategy,
            default_table_strategy,
            algorithms,
        })
    }

    pub fn table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.tables.get(logic_table)
    }

    pub fn table_rules(&self) -> impl Iterator<Item = &TableRule> {
        self.tables.values()
    }

    pub fn is_sharding_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn is_broadcast_table(&self, table: &str) -> bool {
        self.broadcast_tables.contains(table)
    }

    /// True for sharding and broadcast tables.
    pub fn governs(&self, table: &str) -> bool {
        self.is_sharding_table(table) || self.is_broadcast_table(table)
    }

    pub fn data_source_names(&self) -> &NameSet {
        &self.data_sources
    }

    pub fn algorithm(&self, name: &str) -> Option<&Arc<dyn ShardingAlgorithm>> {
        self.algorithms.get(name)
    }

    pub fn database_strategy<'a>(&'a self, table: &'a TableRule) -> &'a ShardingStrategy {
        table
            .database_strategy
            .as_ref()
            .unwrap_or(&self.default_database_strategy)
    }

    pub fn table_strategy<'a>(&'a self, table: &'a TableRule) -> &'a ShardingStrategy {
        table
            .table_strategy
            .as_ref()
            .unwrap_or(&self.default_table_strategy)
    }

    pub fn is_sharding_column(&self, column: &str, table: &str) -> bool {
        self.table_rule(table).map_or(false, |rule| {
            self.database_strategy(rule).is_sharding_column(column)
                || self.table_strategy(rule).is_sharding_column(column)
        })
    }

    pub fn binding_group(&self, table: &str) -> Option<&NameSet> {
        self.binding_groups.iter().find(|g| g.contains(table))
    }

    /// True when every table is in one binding group (a single table counts).
    pub fn is_all_binding_tables(&self, tables: &NameSet) -> bool {
        match tables.first() {
            None => false,
            Some(only) if tables.len() == 1 => self.is_sharding_table(only),
            Some(first) => self
                .binding_group(first)
                .map_or(false, |group| tables.iter().all(|t| group.contains(t))),
        }
    }

    /// Actual table of `logic_table` bound to `primary_actual` of `primary_logic`
    /// in `data_source`, matched by position among each table's actual tables.
    pub fn binding_actual_table(
        &self,
        data_source: &str,
        logic_table: &str,
        primary_logic: &str,
        primary_actual: &str,
    ) -> Result<String> {
        let not_found = || Error::DataNodeNotFound {
            logic_table: logic_table.to_string(),
            data_source: data_source.to_string(),
            table: format!("<bound to {}>", primary_actual),
        };
        let primary = self.table_rule(primary_logic).ok_or_else(not_found)?;
        let bound = self.table_rule(logic_table).ok_or_else(not_found)?;
        let position = primary
            .actual_tables_in(data_source)
            .iter()
            .position(|t| t.eq_ignore_ascii_case(primary_actual))
            .ok_or_else(not_found)?;
        bound
            .actual_tables_in(data_source)
            .iter()
            .nth(position)
            .map(str::to_string)
            .ok_or_else(not_found)
    }
}

fn validate_binding_group(members: &NameSet, tables: &NameMap<TableRule>) -> Result<()> {
    let mut rules = Vec::with_capacity(members.len());
    for member in members.iter() {
        let rule = tables.get(member).ok_or_else(|| {
            Error::Config(format!("binding table {} is not a sharding table", member))
        })?;
        rules.push(rule);
    }
    if let Some((first, rest)) = rules.split_first() {
        for rule in rest {
            if !first.data_sources.iter().eq(rule.data_sources.iter())
                || first.actual_tables.len() != rule.actual_tables.len()
            {
                return Err(Error::Config(format!(
                    "binding tables {} and {} have different data node layouts",
                    first.logic_table, rule.logic_table
                )));
            }
        }
    }
    Ok(())
}

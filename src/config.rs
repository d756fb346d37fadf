//! Declarative rule configuration.
//!
//! Everything the router needs is described by one [`RuleConfiguration`]
//! document, loaded from JSON and validated before rules are built:
//!
//! ```json
//! {
//!   "data_sources": ["ds_0", "ds_1"],
//!   "sharding": {
//!     "tables": [{
//!       "logic_table": "t_order",
//!       "actual_data_nodes": "ds_${0..1}.t_order_${0..2}",
//!       "table_strategy": {
//!         "type": "standard",
//!         "sharding_column": "order_id",
//!         "algorithm_name": "t_order_mod"
//!       }
//!     }],
//!     "algorithms": { "t_order_mod": { "type": "MOD", "props": { "sharding-count": 3 } } }
//!   },
//!   "props": { "sql_show": true }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::datanode::expand_data_nodes;
use crate::error::{Error, Result};
use crate::names::NameSet;
use crate::value::Value;

/// Free-form algorithm properties, e.g. `sharding-count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, serde_json::Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn require_str(&self, owner: &str, key: &str) -> Result<String> {
        self.get_str(key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing(owner, key))
    }

    pub fn require_i64(&self, owner: &str, key: &str) -> Result<i64> {
        match self.0.get(key) {
            None => Err(missing(owner, key)),
            Some(raw) => self.get_i64(key).ok_or_else(|| Error::InvalidProperty {
                owner: owner.to_string(),
                key: key.to_string(),
                reason: format!("{} is not an integer", raw),
            }),
        }
    }
}

fn missing(owner: &str, key: &str) -> Error {
    Error::InvalidProperty {
        owner: owner.to_string(),
        key: key.to_string(),
        reason: "missing".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfiguration {
    #[serde(rename = "type")]
    pub algorithm_type: String,
    #[serde(default)]
    pub props: Properties,
}

impl AlgorithmConfiguration {
    pub fn new(algorithm_type: &str, props: Properties) -> Self {
        Self {
            algorithm_type: algorithm_type.to_string(),
            props,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfiguration {
    Standard {
        sharding_column: String,
        algorithm_name: String,
    },
    Complex {
        /// Comma-separated column list.
        sharding_columns: String,
        algorithm_name: String,
    },
    None,
}

impl StrategyConfiguration {
    pub fn standard(column: &str, algorithm_name: &str) -> Self {
        StrategyConfiguration::Standard {
            sharding_column: column.to_string(),
            algorithm_name: algorithm_name.to_string(),
        }
    }

    pub fn algorithm_name(&self) -> Option<&str> {
        match self {
            StrategyConfiguration::Standard { algorithm_name, .. }
            | StrategyConfiguration::Complex { algorithm_name, .. } => Some(algorithm_name),
            StrategyConfiguration::None => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingTableConfiguration {
    pub logic_table: String,
    /// Inline expression such as `ds_${0..1}.t_order_${0..2}`. When absent the
    /// table lives under its own name in every data source.
    pub actual_data_nodes: Option<String>,
    pub database_strategy: Option<StrategyConfiguration>,
    pub table_strategy: Option<StrategyConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingRuleConfiguration {
    pub tables: Vec<ShardingTableConfiguration>,
    /// Each entry is a comma-separated group, e.g. `t_order, t_order_item`.
    pub binding_tables: Vec<String>,
    pub broadcast_tables: Vec<String>,
    pub default_database_strategy: Option<StrategyConfiguration>,
    pub default_table_strategy: Option<StrategyConfiguration>,
    pub algorithms: BTreeMap<String, AlgorithmConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTableConfiguration {
    pub table: String,
    pub data_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowDataSourceConfiguration {
    pub production_data_source: String,
    pub shadow_data_source: String,
}

/// Column-value shadow detection: rows whose `column` equals one of `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowTableConfiguration {
    pub table: String,
    pub column: String,
    pub values: Vec<Value>,
}

pub const DEFAULT_SHADOW_HINT: &str = "shadow:true";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowRuleConfiguration {
    pub data_sources: Vec<ShadowDataSourceConfiguration>,
    pub tables: Vec<ShadowTableConfiguration>,
    pub hint_marker: String,
}

impl Default for ShadowRuleConfiguration {
    fn default() -> Self {
        Self {
            data_sources: Vec::new(),
            tables: Vec::new(),
            hint_marker: DEFAULT_SHADOW_HINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerType {
    #[default]
    First,
    Random,
    Weight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadwriteGroupConfiguration {
    /// Logical data source name referenced by other rules.
    pub name: String,
    pub write_data_source: String,
    pub read_data_sources: Vec<String>,
    #[serde(default)]
    pub load_balancer: LoadBalancerType,
    /// Relative weights for `WEIGHT`; replicas without an entry get weight 1.
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
}

pub const DEFAULT_WRITE_ROUTE_HINT: &str = "write_route_only";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadwriteSplittingRuleConfiguration {
    pub groups: Vec<ReadwriteGroupConfiguration>,
    pub write_route_hint: String,
}

impl Default for ReadwriteSplittingRuleConfiguration {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            write_route_hint: DEFAULT_WRITE_ROUTE_HINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptColumnConfiguration {
    pub name: String,
    pub cipher_column: String,
    pub encryptor_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptTableConfiguration {
    pub table: String,
    pub columns: Vec<EncryptColumnConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptRuleConfiguration {
    pub tables: Vec<EncryptTableConfiguration>,
    pub encryptors: BTreeMap<String, AlgorithmConfiguration>,
}

/// Feature flags affecting routing and rewrite policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationProperties {
    /// Log every rewritten SQL unit at info level.
    pub sql_show: bool,
    /// Target for statements without tables; any data source when unset.
    pub default_data_source: Option<String>,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfiguration {
    pub data_sources: Vec<String>,
    pub sharding: Option<ShardingRuleConfiguration>,
    pub single_tables: Vec<SingleTableConfiguration>,
    pub shadow: Option<ShadowRuleConfiguration>,
    pub readwrite_splitting: Option<ReadwriteSplittingRuleConfiguration>,
    pub encrypt: Option<EncryptRuleConfiguration>,
    pub props: ConfigurationProperties,
}

impl RuleConfiguration {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: RuleConfiguration = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Logical data source names: read/write groups replace their members.
    pub fn logical_data_sources(&self) -> NameSet {
        let mut names = NameSet::new();
        let groups = self
            .readwrite_splitting
            .as_ref()
            .map(|rw| rw.groups.as_slice())
            .unwrap_or_default();
        let shadows = self
            .shadow
            .as_ref()
            .map(|s| s.data_sources.as_slice())
            .unwrap_or_default();
        let hidden: NameSet = groups
            .iter()
            .flat_map(|g| {
                std::iter::once(g.write_data_source.as_str())
                    .chain(g.read_data_sources.iter().map(String::as_str))
            })
            .chain(shadows.iter().map(|s| s.shadow_data_source.as_str()))
            .collect();
        for ds in &self.data_sources {
            if !hidden.contains(ds) {
                names.insert(ds.clone());
            }
        }
        for group in groups {
            names.insert(group.name.clone());
        }
        names
    }

    /// Structural checks that do not need algorithm instances.
    pub fn validate(&self) -> Result<()> {
        if self.data_sources.is_empty() {
            return Err(Error::Config("no data sources configured".to_string()));
        }
        let physical: NameSet = self.data_sources.iter().cloned().collect();
        if physical.len() != self.data_sources.len() {
            return Err(Error::Config(format!(
                "duplicate data source in {:?}",
                self.data_sources
            )));
        }
        let logical = self.logical_data_sources();

        if let Some(rw) = &self.readwrite_splitting {
            for group in &rw.groups {
                let members =
                    std::iter::once(&group.write_data_source).chain(&group.read_data_sources);
                for member in members {
                    if !physical.contains(member) {
                        return Err(Error::Config(format!(
                            "read/write group {} references unknown data source {}",
                            group.name, member
                        )));
                    }
                }
                if group.read_data_sources.is_empty() {
                    return Err(Error::Config(format!(
                        "read/write group {} has no read data sources",
                        group.name
                    )));
                }
            }
        }

        if let Some(shadow) = &self.shadow {
            for mapping in &shadow.data_sources {
                if !logical.contains(&mapping.production_data_source) {
                    return Err(Error::Config(format!(
                        "shadow production data source {} is not configured",
                        mapping.production_data_source
                    )));
                }
                if !physical.contains(&mapping.shadow_data_source) {
                    return Err(Error::Config(format!(
                        "shadow data source {} is not configured",
                        mapping.shadow_data_source
                    )));
                }
            }
        }

        if let Some(sharding) = &self.sharding {
            let mut seen = NameSet::new();
            for table in &sharding.tables {
                if table.logic_table.trim().is_empty() {
                    return Err(Error::Config("sharding table without logic_table".to_string()));
                }
                if !seen.insert(table.logic_table.clone()) {
                    return Err(Error::Config(format!(
                        "sharding table {} configured twice",
                        table.logic_table
                    )));
                }
                if let Some(expression) = &table.actual_data_nodes {
                    for node in expand_data_nodes(expression)? {
                        if !logical.contains(&node.data_source) {
                            return Err(Error::Config(format!(
                                "actual data node {} of {} uses unknown data source",
                                node, table.logic_table
                            )));
                        }
                    }
                }
            }
            for group in &sharding.binding_tables {
                for table in group.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    if !seen.contains(table) {
                        return Err(Error::Config(format!(
                            "binding table {} is not a sharding table",
                            table
                        )));
                    }
                }
            }
        }

        for single in &self.single_tables {
            if !logical.contains(&single.data_source) {
                return Err(Error::Config(format!(
                    "single table {} uses unknown data source {}",
                    single.table, single.data_source
                )));
            }
        }

        if let Some(default) = &self.props.default_data_source {
            if !logical.contains(default) {
                return Err(Error::Config(format!(
                    "default data source {} is not configured",
                    default
                )));
            }
        }
        Ok(())
    }
}

use tracing::info;

use crate::config::{ConfigurationProperties, RuleConfiguration};
use crate::error::{Error, Result};
use crate::features::{EncryptRule, ReadwriteSplittingRule, ShadowRule, SingleTableRule};
use crate::names::NameSet;
use crate::sharding::{AlgorithmRegistry, ShardingRule};

/// All rules of one logical database. Built once, read-only afterwards and
/// shared between threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    data_sources: NameSet,
    sharding: Option<ShardingRule>,
    single: SingleTableRule,
    shadow: Option<ShadowRule>,
    readwrite: Option<ReadwriteSplittingRule>,
    encrypt: Option<EncryptRule>,
    props: ConfigurationProperties,
}

impl RuleSet {
    pub fn build(config: &RuleConfiguration) -> Result<Self> {
        Self::build_with_registry(config, &AlgorithmRegistry::default())
    }

    pub fn build_with_registry(
        config: &RuleConfiguration,
        registry: &AlgorithmRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let data_sources = config.logical_data_sources();
        if data_sources.is_empty() {
            return Err(Error::Config("no logical data sources".to_string()));
        }

        let sharding = config
            .sharding
            .as_ref()
            .map(|c| ShardingRule::build(c, &data_sources, registry))
            .transpose()?;
        let single = SingleTableRule::build(&config.single_tables, &data_sources)?;
        if let Some(sharding) = &sharding {
            for table in sharding.table_rules() {
                if single.contains(&table.logic_table) {
                    return Err(Error::Config(format!(
                        "table {} cannot be both sharding and single",
                        table.logic_table
                    )));
                }
            }
        }
        let shadow = config.shadow.as_ref().map(ShadowRule::build);
        let readwrite = config
            .readwrite_splitting
            .as_ref()
            .map(ReadwriteSplittingRule::build)
            .transpose()?;
        let encrypt = config.encrypt.as_ref().map(EncryptRule::build).transpose()?;

        info!(
            data_sources = data_sources.len(),
            sharding_tables = sharding.as_ref().map_or(0, |s| s.table_rules().count()),
            shadow = shadow.is_some(),
            readwrite = readwrite.is_some(),
            encrypt = encrypt.is_some(),
            "rules built"
        );

        Ok(Self {
            data_sources,
            sharding,
            single,
            shadow,
            readwrite,
            encrypt,
            props: config.props.clone(),
        })
    }

    /// Logical data sources, in configuration order.
    pub fn data_source_names(&self) -> &NameSet {
        &self.data_sources
    }

    pub fn sharding(&self) -> Option<&ShardingRule> {
        self.sharding.as_ref()
    }

    pub fn single(&self) -> &SingleTableRule {
        &self.single
    }

    pub fn shadow(&self) -> Option<&ShadowRule> {
        self.shadow.as_ref()
    }

    pub fn readwrite(&self) -> Option<&ReadwriteSplittingRule> {
        self.readwrite.as_ref()
    }

    pub fn encrypt(&self) -> Option<&EncryptRule> {
        self.encrypt.as_ref()
    }

    pub fn props(&self) -> &ConfigurationProperties {
        &self.props
    }

    pub fn is_sharding_table(&self, table: &str) -> bool {
        self.sharding.as_ref().map_or(false, |s| s.is_sharding_table(table))
    }

    pub fn is_broadcast_table(&self, table: &str) -> bool {
        self.sharding.as_ref().map_or(false, |s| s.is_broadcast_table(table))
    }
}

use crate::config::SingleTableConfiguration;
use crate::error::{Error, Result};
use crate::names::{NameMap, NameSet};

/// Tables outside every sharding rule, each stored in exactly one data source.
#[derive(Debug, Clone, Default)]
pub struct SingleTableRule {
    tables: NameMap<String>,
}

impl SingleTableRule {
    pub fn build(configs: &[SingleTableConfiguration], data_sources: &NameSet) -> Result<Self> {
        let mut tables = NameMap::new();
        for config in configs {
            let data_source = data_sources.get(&config.data_source).ok_or_else(|| {
                Error::Config(format!(
                    "single table {} uses unknown data source {}",
                    config.table, config.data_source
                ))
            })?;
            if let Some(previous) = tables.insert(config.table.clone(), data_source.to_string()) {
                return Err(Error::Config(format!(
                    "single table {} recorded in both {} and {}",
                    config.table, previous, config.data_source
                )));
            }
        }
        Ok(Self { tables })
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn data_source(&self, table: &str) -> Option<&str> {
        self.tables.get(table).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tables() {
        let ds: NameSet = ["ds_0", "ds_1"].into_iter().collect();
        let rule = SingleTableRule::build(
            &[SingleTableConfiguration {
                table: "t_user".to_string(),
                data_source: "DS_1".to_string(),
            }],
            &ds,
        )
        .unwrap();
        assert_eq!(rule.data_source("T_USER"), Some("ds_1"));
        assert!(!rule.contains("t_order"));

        let dup = vec![
            SingleTableConfiguration {
                table: "t_user".to_string(),
                data_source: "ds_0".to_string(),
            },
            SingleTableConfiguration {
                table: "t_user".to_string(),
                data_source: "ds_1".to_string(),
            },
        ];
        assert!(SingleTableRule::build(&dup, &ds).is_err());
    }
}

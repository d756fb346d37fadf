use super::*;

const SHARDING_COUNT: &str = "sharding-count";

/// `value % sharding-count` mapped through the data node naming convention.
#[derive(Debug, Clone)]
pub struct ModShardingAlgorithm {
    sharding_count: i64,
}

impl ModShardingAlgorithm {
    pub fn new(props: &Properties) -> Result<Self> {
        Ok(Self {
            sharding_count: positive_count(props, "MOD", SHARDING_COUNT)?,
        })
    }

    fn target(&self, value: i64, info: &crate::datanode::DataNodeInfo) -> String {
        info.actual_name(value.rem_euclid(self.sharding_count) as u64)
    }
}

impl ShardingAlgorithm for ModShardingAlgorithm {
    fn algorithm_type(&self) -> &'static str {
        "MOD"
    }

    fn do_sharding(
        &self,
        _available: &NameSet,
        value: &PreciseShardingValue<'_>,
    ) -> Result<String> {
        let v = integer_value("MOD", value)?;
        Ok(self.target(v, value.data_node_info))
    }

    fn do_range_sharding(
        &self,
        available: &NameSet,
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        match value.range.integer_bounds() {
            Some((Some(low), Some(high))) if high < low => Ok(Vec::new()),
            Some((Some(low), Some(high))) => match high.checked_sub(low) {
                // Narrower than one full cycle: only the covered remainders.
                Some(width) if width < self.sharding_count - 1 => {
                    let mut targets = NameSet::new();
                    for v in low..=high {
                        targets.insert(self.target(v, value.data_node_info));
                    }
                    Ok(targets.to_vec())
                }
                _ => Ok(all_available(available)),
            },
            _ => Ok(all_available(available)),
        }
    }
}

/// CRC32 of the value's text modulo `sharding-count`.
#[derive(Debug, Clone)]
pub struct HashModShardingAlgorithm {
    sharding_count: i64,
}

impl HashModShardingAlgorithm {
    pub fn new(props: &Properties) -> Result<Self> {
        Ok(Self {
            sharding_count: positive_count(props, "HASH_MOD", SHARDING_COUNT)?,
        })
    }

    pub fn hash_index(&self, value: &crate::value::Value) -> u64 {
        let hash = crc32fast::hash(value.to_string().as_bytes()) as u64;
        hash % self.sharding_count as u64
    }
}

impl ShardingAlgorithm for HashModShardingAlgorithm {
    fn algorithm_type(&self) -> &'static str {
        "HASH_MOD"
    }

    fn do_sharding(
        &self,
        _available: &NameSet,
        value: &PreciseShardingValue<'_>,
    ) -> Result<String> {
        if value.value.is_null() {
            return Err(Error::InvalidShardingValue {
                table: value.table.to_string(),
                column: value.column.to_string(),
                value: "NULL".to_string(),
            });
        }
        Ok(value.data_node_info.actual_name(self.hash_index(value.value)))
    }

    fn do_range_sharding(
        &self,
        available: &NameSet,
        _value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        Ok(all_available(available))
    }
}

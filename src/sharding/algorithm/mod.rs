//! Sharding algorithms and the registry that instantiates them by type.

mod inline;
mod modulo;
mod range;

pub use inline::{ComplexInlineShardingAlgorithm, InlineShardingAlgorithm};
pub use modulo::{HashModShardingAlgorithm, ModShardingAlgorithm};
pub use range::{BoundaryRangeShardingAlgorithm, VolumeRangeShardingAlgorithm};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Properties;
use crate::error::{Error, Result};
use crate::names::NameSet;
use crate::sharding::value::{ComplexShardingValue, PreciseShardingValue, RangeShardingValue};

/// Maps a value or range to the actual names holding it.
///
/// Implementations are pure: the same input always yields the same names, and
/// names outside `available` are reported back to the caller unchanged so the
/// strategy can reject them.
pub trait ShardingAlgorithm: Send + Sync + fmt::Debug {
    fn algorithm_type(&self) -> &'static str;

    fn do_sharding(&self, available: &NameSet, value: &PreciseShardingValue<'_>) -> Result<String>;

    fn do_range_sharding(
        &self,
        available: &NameSet,
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>>;

    fn do_complex_sharding(
        &self,
        _available: &NameSet,
        value: &ComplexShardingValue<'_>,
    ) -> Result<Vec<String>> {
        Err(Error::AlgorithmFailed {
            algorithm: self.algorithm_type().to_string(),
            table: value.table.to_string(),
            column: value
                .values
                .iter()
                .map(|(c, _)| *c)
                .chain(value.ranges.iter().map(|(c, _)| *c))
                .collect::<Vec<_>>()
                .join(","),
            reason: "multiple sharding columns are not supported".to_string(),
        })
    }
}

pub type AlgorithmFactory =
    Arc<dyn Fn(&Properties) -> Result<Arc<dyn ShardingAlgorithm>> + Send + Sync>;

/// Type-string keyed algorithm factories.
///
/// A registry is populated before rules are built; the rule keeps the
/// algorithm instances it creates for its own lifetime.
#[derive(Clone)]
pub struct AlgorithmRegistry {
    factories: HashMap<String, AlgorithmFactory>,
}

impl AlgorithmRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("MOD", |props| Ok(Arc::new(ModShardingAlgorithm::new(props)?)));
        registry.register("HASH_MOD", |props| {
            Ok(Arc::new(HashModShardingAlgorithm::new(props)?))
        });
        registry.register("INLINE", |props| {
            Ok(Arc::new(InlineShardingAlgorithm::new(props)?))
        });
        registry.register("COMPLEX_INLINE", |props| {
            Ok(Arc::new(ComplexInlineShardingAlgorithm::new(props)?))
        });
        registry.register("BOUNDARY_RANGE", |props| {
            Ok(Arc::new(BoundaryRangeShardingAlgorithm::new(props)?))
        });
        registry.register("VOLUME_RANGE", |props| {
            Ok(Arc::new(VolumeRangeShardingAlgorithm::new(props)?))
        });
        registry
    }

    /// Registers or replaces the factory for `algorithm_type` (case-insensitive).
    pub fn register<F>(&mut self, algorithm_type: &str, factory: F)
    where
        F: Fn(&Properties) -> Result<Arc<dyn ShardingAlgorithm>> + Send + Sync + 'static,
    {
        self.factories
            .insert(algorithm_type.to_ascii_uppercase(), Arc::new(factory));
    }

    pub fn contains(&self, algorithm_type: &str) -> bool {
        self.factories
            .contains_key(&algorithm_type.to_ascii_uppercase())
    }

    pub fn create(
        &self,
        algorithm_type: &str,
        props: &Properties,
    ) -> Result<Arc<dyn ShardingAlgorithm>> {
        let factory = self
            .factories
            .get(&algorithm_type.to_ascii_uppercase())
            .ok_or_else(|| Error::UnknownAlgorithmType {
                algorithm_type: algorithm_type.to_string(),
            })?;
        factory(props)
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("types", &self.types())
            .finish()
    }
}

pub(crate) fn positive_count(props: &Properties, owner: &str, key: &str) -> Result<i64> {
    let count = props.require_i64(owner, key)?;
    if count <= 0 {
        return Err(Error::InvalidProperty {
            owner: owner.to_string(),
            key: key.to_string(),
            reason: format!("must be positive, got {}", count),
        });
    }
    Ok(count)
}

pub(crate) fn integer_value(algorithm: &str, value: &PreciseShardingValue<'_>) -> Result<i64> {
    value.value.as_i64().ok_or_else(|| Error::InvalidShardingValue {
        table: value.table.to_string(),
        column: value.column.to_string(),
        value: format!("{} (algorithm {} needs an integer)", value.value, algorithm),
    })
}

pub(crate) fn all_available(available: &NameSet) -> Vec<String> {
    available.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datanode::DataNodeInfo;
    use crate::value::Value;

    #[derive(Debug)]
    struct FirstAlgorithm;

    impl ShardingAlgorithm for FirstAlgorithm {
        fn algorithm_type(&self) -> &'static str {
            "FIRST"
        }

        fn do_sharding(
            &self,
            available: &NameSet,
            _value: &PreciseShardingValue<'_>,
        ) -> Result<String> {
            Ok(available.first().unwrap_or_default().to_string())
        }

        fn do_range_sharding(
            &self,
            available: &NameSet,
            _value: &RangeShardingValue<'_>,
        ) -> Result<Vec<String>> {
            Ok(available.to_vec())
        }
    }

    #[test]
    fn test_builtin_types() {
        let registry = AlgorithmRegistry::with_builtins();
        let types = [
            "MOD",
            "hash_mod",
            "INLINE",
            "COMPLEX_INLINE",
            "BOUNDARY_RANGE",
            "VOLUME_RANGE",
        ];
        for ty in types {
            assert!(registry.contains(ty), "{}", ty);
        }
        let err = registry.create("CRON", &Properties::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithmType { .. }));
    }

    #[test]
    fn test_register_custom_algorithm() {
        let mut registry = AlgorithmRegistry::empty();
        registry.register("first", |_| Ok(Arc::new(FirstAlgorithm)));
        let algorithm = registry.create("FIRST", &Properties::new()).unwrap();

        let available: NameSet = ["t_1", "t_2"].into_iter().collect();
        let info = DataNodeInfo::new("t_", 1, '0');
        let value = Value::Int(9);
        let target = algorithm
            .do_sharding(
                &available,
                &PreciseShardingValue {
                    table: "t",
                    column: "id",
                    data_node_info: &info,
                    value: &value,
                },
            )
            .unwrap();
        assert_eq!(target, "t_1");
    }

    #[test]
    fn test_missing_count_is_config_error() {
        let registry = AlgorithmRegistry::with_builtins();
        let err = registry.create("MOD", &Properties::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidProperty { .. }));
        let err = registry
            .create("MOD", &Properties::new().with("sharding-count", 0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProperty { .. }));
    }
}

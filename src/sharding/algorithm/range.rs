use super::*;

use crate::datanode::DataNodeInfo;

const SHARDING_RANGES: &str = "sharding-ranges";
const RANGE_LOWER: &str = "range-lower";
const RANGE_UPPER: &str = "range-upper";
const SHARDING_VOLUME: &str = "sharding-volume";

/// Ascending partition boundaries. Partition 0 holds values below the first
/// boundary, partition `i` holds `[boundaries[i-1], boundaries[i])`.
#[derive(Debug, Clone)]
struct Partitions {
    boundaries: Vec<i64>,
}

impl Partitions {
    fn partition_of(&self, value: i64) -> u64 {
        self.boundaries.partition_point(|&b| b <= value) as u64
    }

    fn last(&self) -> u64 {
        self.boundaries.len() as u64
    }

    fn precise(&self, algorithm: &str, value: &PreciseShardingValue<'_>) -> Result<String> {
        let v = integer_value(algorithm, value)?;
        Ok(value.data_node_info.actual_name(self.partition_of(v)))
    }

    fn range(&self, info: &DataNodeInfo, value: &RangeShardingValue<'_>) -> Vec<String> {
        let (low, high) = match value.range.integer_bounds() {
            Some(bounds) => bounds,
            None => (None, None),
        };
        let first = low.map(|v| self.partition_of(v)).unwrap_or(0);
        let last = high.map(|v| self.partition_of(v)).unwrap_or_else(|| self.last());
        (first..=last).map(|i| info.actual_name(i)).collect()
    }
}

/// Explicit boundaries from `sharding-ranges`, e.g. `10,20,30` gives four partitions.
#[derive(Debug, Clone)]
pub struct BoundaryRangeShardingAlgorithm {
    partitions: Partitions,
}

impl BoundaryRangeShardingAlgorithm {
    pub fn new(props: &Properties) -> Result<Self> {
        let raw = props.require_str("BOUNDARY_RANGE", SHARDING_RANGES)?;
        let invalid = |reason: String| Error::InvalidProperty {
            owner: "BOUNDARY_RANGE".to_string(),
            key: SHARDING_RANGES.to_string(),
            reason,
        };
        let mut boundaries = Vec::new();
        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let boundary: i64 = item
                .parse()
                .map_err(|_| invalid(format!("'{}' is not an integer", item)))?;
            if boundaries.last().map_or(false, |&prev| boundary <= prev) {
                return Err(invalid(format!("{} is not ascending", raw)));
            }
            boundaries.push(boundary);
        }
        if boundaries.is_empty() {
            return Err(invalid("no boundaries".to_string()));
        }
        Ok(Self {
            partitions: Partitions { boundaries },
        })
    }
}

impl ShardingAlgorithm for BoundaryRangeShardingAlgorithm {
    fn algorithm_type(&self) -> &'static str {
        "BOUNDARY_RANGE"
    }

    fn do_sharding(
        &self,
        _available: &NameSet,
        value: &PreciseShardingValue<'_>,
    ) -> Result<String> {
        self.partitions.precise("BOUNDARY_RANGE", value)
    }

    fn do_range_sharding(
        &self,
        _available: &NameSet,
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        Ok(self.partitions.range(value.data_node_info, value))
    }
}

/// Fixed-volume partitions between `range-lower` and `range-upper`.
#[derive(Debug, Clone)]
pub struct VolumeRangeShardingAlgorithm {
    partitions: Partitions,
}

impl VolumeRangeShardingAlgorithm {
    pub fn new(props: &Properties) -> Result<Self> {
        let lower = props.require_i64("VOLUME_RANGE", RANGE_LOWER)?;
        let upper = props.require_i64("VOLUME_RANGE", RANGE_UPPER)?;
        let volume = positive_count(props, "VOLUME_RANGE", SHARDING_VOLUME)?;
        if upper <= lower {
            return Err(Error::InvalidProperty {
                owner: "VOLUME_RANGE".to_string(),
                key: RANGE_UPPER.to_string(),
                reason: format!("{} must exceed {}={}", upper, RANGE_LOWER, lower),
            });
        }
        let mut boundaries = Vec::new();
        let mut next = lower;
        while next < upper {
            boundaries.push(next);
            next = match next.checked_add(volume) {
                Some(v) => v,
                None => break,
            };
        }
        boundaries.push(upper);
        Ok(Self {
            partitions: Partitions { boundaries },
        })
    }
}

impl ShardingAlgorithm for VolumeRangeShardingAlgorithm {
    fn algorithm_type(&self) -> &'static str {
        "VOLUME_RANGE"
    }

    fn do_sharding(
        &self,
        _available: &NameSet,
        value: &PreciseShardingValue<'_>,
    ) -> Result<String> {
        self.partitions.precise("VOLUME_RANGE", value)
    }

    fn do_range_sharding(
        &self,
        _available: &NameSet,
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        Ok(self.partitions.range(value.data_node_info, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::value::ShardingRange;
    use crate::value::Value;

    #[test]
    fn test_boundary_partitions() {
        let props = Properties::new().with(SHARDING_RANGES, "10, 20, 30");
        let algorithm = BoundaryRangeShardingAlgorithm::new(&props).unwrap();
        let info = DataNodeInfo::new("t_", 1, '0');
        let available = NameSet::new();
        for (value, expected) in [(-5, "t_0"), (10, "t_1"), (29, "t_2"), (30, "t_3")] {
            let v = Value::Int(value);
            let target = algorithm
                .do_sharding(
                    &available,
                    &PreciseShardingValue {
                        table: "t",
                        column: "id",
                        data_node_info: &info,
                        value: &v,
                    },
                )
                .unwrap();
            assert_eq!(target, expected, "value {}", value);
        }

        let range = ShardingRange::closed(Value::Int(15), Value::Int(25));
        let targets = algorithm
            .do_range_sharding(
                &available,
                &RangeShardingValue {
                    table: "t",
                    column: "id",
                    data_node_info: &info,
                    range: &range,
                },
            )
            .unwrap();
        assert_eq!(targets, vec!["t_1", "t_2"]);
    }

    #[test]
    fn test_boundaries_must_ascend() {
        for ranges in ["5,1", "a"] {
            let props = Properties::new().with(SHARDING_RANGES, ranges);
            assert!(BoundaryRangeShardingAlgorithm::new(&props).is_err(), "{}", ranges);
        }
    }

    #[test]
    fn test_volume_partitions() {
        let props = Properties::new()
            .with(RANGE_LOWER, 10)
            .with(RANGE_UPPER, 40)
            .with(SHARDING_VOLUME, 10);
        let algorithm = VolumeRangeShardingAlgorithm::new(&props).unwrap();
        assert_eq!(algorithm.partitions.boundaries, vec![10, 20, 30, 40]);

        let info = DataNodeInfo::new("t_", 1, '0');
        let range = ShardingRange::at_least(Value::Int(35));
        let targets = algorithm
            .do_range_sharding(
                &NameSet::new(),
                &RangeShardingValue {
                    table: "t",
                    column: "id",
                    data_node_info: &info,
                    range: &range,
                },
            )
            .unwrap();
        assert_eq!(targets, vec!["t_3", "t_4"]);
    }
}

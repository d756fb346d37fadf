use rand::Rng;

use crate::config::{
    LoadBalancerType, ReadwriteGroupConfiguration, ReadwriteSplittingRuleConfiguration,
};
use crate::error::{Error, Result};
use crate::names::NameMap;
use crate::statement::{CommentSegment, StatementContext};

use super::comments_with_marker;

/// Picks one replica for a read.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadBalancer {
    First,
    Random,
    /// Cumulative weights aligned with the group's read data sources.
    Weight { cumulative: Vec<u64> },
}

impl LoadBalancer {
    fn build(config: &ReadwriteGroupConfiguration) -> Result<Self> {
        Ok(match config.load_balancer {
            LoadBalancerType::First => LoadBalancer::First,
            LoadBalancerType::Random => LoadBalancer::Random,
            LoadBalancerType::Weight => {
                let mut total = 0u64;
                let mut cumulative = Vec::with_capacity(config.read_data_sources.len());
                for read in &config.read_data_sources {
                    let weight = config
                        .weights
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(read))
                        .map_or(1, |(_, w)| *w);
                    total += u64::from(weight);
                    cumulative.push(total);
                }
                if total == 0 {
                    return Err(Error::Config(format!(
                        "read/write group {} has zero total weight",
                        config.name
                    )));
                }
                LoadBalancer::Weight { cumulative }
            }
        })
    }

    pub fn choose<'a>(&self, reads: &'a [String]) -> Option<&'a str> {
        if reads.is_empty() {
            return None;
        }
        let index = match self {
            LoadBalancer::First => 0,
            LoadBalancer::Random => rand::rng().random_range(0..reads.len()),
            LoadBalancer::Weight { cumulative } => {
                let total = cumulative.last().copied().unwrap_or(0);
                if total == 0 {
                    0
                } else {
                    let point = rand::rng().random_range(0..total);
                    cumulative.partition_point(|&c| c <= point)
                }
            }
        };
        reads.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ReadwriteGroup {
    pub name: String,
    pub write_data_source: String,
    pub read_data_sources: Vec<String>,
    pub load_balancer: LoadBalancer,
}

/// Logical data sources backed by one primary and several replicas.
#[derive(Debug, Clone)]
pub struct ReadwriteSplittingRule {
    groups: NameMap<ReadwriteGroup>,
    write_route_hint: String,
}

impl ReadwriteSplittingRule {
    pub fn build(config: &ReadwriteSplittingRuleConfiguration) -> Result<Self> {
        let mut groups = NameMap::new();
        for group in &config.groups {
            let built = ReadwriteGroup {
                name: group.name.clone(),
                write_data_source: group.write_data_source.clone(),
                read_data_sources: group.read_data_sources.clone(),
                load_balancer: LoadBalancer::build(group)?,
            };
            if groups.insert(group.name.clone(), built).is_some() {
                return Err(Error::Config(format!(
                    "read/write group {} configured twice",
                    group.name
                )));
            }
        }
        Ok(Self {
            groups,
            write_route_hint: config.write_route_hint.clone(),
        })
    }

    pub fn group(&self, name: &str) -> Option<&ReadwriteGroup> {
        self.groups.get(name)
    }

    pub fn hint_comments<'a>(&self, statement: &'a StatementContext) -> Vec<&'a CommentSegment> {
        comments_with_marker(statement, &self.write_route_hint)
    }

    /// Writes, locking reads and hinted statements go to the primary.
    pub fn is_primary_route(&self, statement: &StatementContext) -> bool {
        statement.kind.is_write()
            || statement.lock_for_update
            || !self.hint_comments(statement).is_empty()
    }

    /// Actual data source for `logical`, or `None` when it is not a group.
    pub fn route(&self, logical: &str, primary: bool) -> Option<&str> {
        let group = self.groups.get(logical)?;
        if primary {
            return Some(&group.write_data_source);
        }
        group
            .load_balancer
            .choose(&group.read_data_sources)
            .or(Some(group.write_data_source.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{StatementBuilder, StatementKind};
    use std::collections::BTreeMap;

    fn rule(
        load_balancer: LoadBalancerType,
        weights: BTreeMap<String, u32>,
    ) -> ReadwriteSplittingRule {
        ReadwriteSplittingRule::build(&ReadwriteSplittingRuleConfiguration {
            groups: vec![ReadwriteGroupConfiguration {
                name: "ds".to_string(),
                write_data_source: "primary".to_string(),
                read_data_sources: vec!["replica_0".to_string(), "replica_1".to_string()],
                load_balancer,
                weights,
            }],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_writes_go_to_primary() {
        let rule = rule(LoadBalancerType::First, BTreeMap::new());
        assert_eq!(rule.route("ds", true), Some("primary"));
        assert_eq!(rule.route("ds", false), Some("replica_0"));
        assert_eq!(rule.route("other", false), None);

        let update = StatementBuilder::new(StatementKind::Update, "UPDATE t SET a = 1")
            .build()
            .unwrap();
        assert!(rule.is_primary_route(&update));

        let hinted = StatementBuilder::new(StatementKind::Select, "/* write_route_only */ SELECT 1")
            .comment()
            .build()
            .unwrap();
        assert!(rule.is_primary_route(&hinted));
    }

    #[test]
    fn test_weight_balancer_respects_zero_weight() {
        let mut weights = BTreeMap::new();
        weights.insert("replica_0".to_string(), 0);
        weights.insert("replica_1".to_string(), 5);
        let rule = rule(LoadBalancerType::Weight, weights);
        for _ in 0..50 {
            assert_eq!(rule.route("ds", false), Some("replica_1"));
        }
    }

    #[test]
    fn test_random_balancer_stays_in_group() {
        let rule = rule(LoadBalancerType::Random, BTreeMap::new());
        for _ in 0..50 {
            let chosen = rule.route("ds", false).unwrap();
            assert!(chosen == "replica_0" || chosen == "replica_1");
        }
    }
}

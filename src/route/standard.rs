//! Standard sharding route.
//!
//! Sharding tables are grouped into binding clusters. Each cluster routes
//! through its primary table's strategies, the other members follow the
//! primary's actual table by position. Clusters are then joined per data
//! source and broadcast tables ride along under their own names.

use tracing::{debug, trace};

use crate::datanode::DataNode;
use crate::error::{Error, Result};
use crate::names::NameSet;
use crate::rule::RuleSet;
use crate::sharding::condition::{self, ShardingCondition};
use crate::sharding::{ShardingConditionValue, ShardingRule, TableRule};
use crate::statement::{StatementContext, StatementKind};
use crate::value::Value;

use super::{RouteCategory, RouteContext, RouteContextBuilder, RouteMapper, RouteUnit};

/// Data nodes of `table_rule` selected by `values`: the database strategy picks
/// among the table's data sources, then the table strategy picks among the
/// actual tables present in each of them.
pub fn route_data_nodes(
    sharding: &ShardingRule,
    table_rule: &TableRule,
    values: &[ShardingConditionValue],
) -> Result<Vec<DataNode>> {
    let logic_table = table_rule.logic_table.as_str();
    let data_sources = sharding.database_strategy(table_rule).do_sharding(
        logic_table,
        table_rule.data_source_names(),
        values,
        table_rule.data_source_info(),
    )?;
    let mut nodes = Vec::new();
    for data_source in data_sources {
        let available = table_rule.actual_tables_in(&data_source);
        let tables = sharding.table_strategy(table_rule).do_sharding(
            logic_table,
            &available,
            values,
            table_rule.table_info(),
        )?;
        for table in tables {
            nodes.push(DataNode::new(data_source.clone(), table));
        }
    }
    trace!(table = logic_table, nodes = nodes.len(), "data nodes routed");
    Ok(nodes)
}

/// Binding cluster: a primary table and the bound tables that follow it.
#[derive(Debug)]
struct Cluster<'a> {
    primary: &'a TableRule,
    members: Vec<&'a str>,
}

fn clusters<'a>(sharding: &'a ShardingRule, tables: &'a NameSet) -> Result<Vec<Cluster<'a>>> {
    let mut clustered = NameSet::new();
    let mut result = Vec::new();
    for table in tables.iter().filter(|t| sharding.is_sharding_table(t)) {
        if clustered.contains(table) {
            continue;
        }
        let members: Vec<&str> = match sharding.binding_group(table) {
            Some(group) => tables.iter().filter(|t| group.contains(t)).collect(),
            None => vec![table],
        };
        let primary = sharding.table_rule(table).ok_or_else(|| Error::Unroutable {
            tables: vec![table.to_string()],
        })?;
        for member in &members {
            clustered.insert(*member);
        }
        result.push(Cluster { primary, members });
    }
    Ok(result)
}

/// Condition values of every cluster member, restated for the primary table.
fn cluster_values(
    condition: &ShardingCondition,
    cluster: &Cluster<'_>,
) -> Vec<ShardingConditionValue> {
    let primary = cluster.primary.logic_table.as_str();
    let mut values: Vec<ShardingConditionValue> = Vec::new();
    for member in &cluster.members {
        for mut value in condition.values_for(member) {
            value.table = primary.to_string();
            match values.iter_mut().find(|v| v.is_for(primary, &value.column)) {
                Some(existing) => *existing = existing.merge(&value),
                None => values.push(value),
            }
        }
    }
    values
}

type PartialUnit = (String, Vec<RouteMapper>);

fn route_cluster(
    sharding: &ShardingRule,
    cluster: &Cluster<'_>,
    condition: &ShardingCondition,
) -> Result<Vec<PartialUnit>> {
    let values = cluster_values(condition, cluster);
    let nodes = if values.iter().any(ShardingConditionValue::is_always_false) {
        let first = cluster.primary.actual_data_nodes().first().cloned();
        debug!(
            table = %cluster.primary.logic_table,
            "always-false condition, routing to first data node"
        );
        first.into_iter().collect()
    } else {
        route_data_nodes(sharding, cluster.primary, &values)?
    };

    let primary = cluster.primary.logic_table.as_str();
    let mut partials = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mut mappers = Vec::with_capacity(cluster.members.len());
        for member in &cluster.members {
            let actual = if member.eq_ignore_ascii_case(primary) {
                node.table.clone()
            } else {
                sharding.binding_actual_table(&node.data_source, member, primary, &node.table)?
            };
            mappers.push(RouteMapper::new(*member, actual));
        }
        partials.push((node.data_source, mappers));
    }
    Ok(partials)
}

/// Joins the clusters' partial units on their data source.
fn join(clusters: Vec<Vec<PartialUnit>>) -> Vec<PartialUnit> {
    let mut iter = clusters.into_iter();
    let mut joined = match iter.next() {
        Some(first) => first,
        None => return Vec::new(),
    };
    for cluster in iter {
        let mut next = Vec::new();
        for (data_source, mappers) in &joined {
            for (other_source, other_mappers) in &cluster {
                if data_source.eq_ignore_ascii_case(other_source) {
                    let mut combined = mappers.clone();
                    combined.extend(other_mappers.iter().cloned());
                    next.push((data_source.clone(), combined));
                }
            }
        }
        joined = next;
    }
    joined
}

pub fn route(
    statement: &StatementContext,
    parameters: &[Value],
    rules: &RuleSet,
) -> Result<RouteContext> {
    let tables = statement.table_names();
    let sharding = rules.sharding().ok_or_else(|| Error::Unroutable {
        tables: tables.to_vec(),
    })?;
    let conditions = condition::extract(statement, parameters, sharding)?;
    let clusters = clusters(sharding, &tables)?;
    let broadcast: Vec<&str> = tables.iter().filter(|t| sharding.is_broadcast_table(t)).collect();

    let default_condition = ShardingCondition::default();
    let all_conditions: Vec<&ShardingCondition> = if conditions.is_empty() {
        vec![&default_condition]
    } else {
        conditions.conditions.iter().collect()
    };

    let mut builder = RouteContextBuilder::new();
    for condition in all_conditions {
        let mut partials = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            partials.push(route_cluster(sharding, cluster, condition)?);
        }
        let units = join(partials);
        if statement.kind == StatementKind::Insert && units.len() > 1 {
            return Err(Error::UnsupportedStatement {
                reason: format!(
                    "insert row {} routes to {} data nodes",
                    condition.row.unwrap_or(0),
                    units.len()
                ),
            });
        }
        for (data_source, mut mappers) in units {
            mappers.extend(broadcast.iter().map(|t| RouteMapper::identity(*t)));
            builder.push(RouteUnit::new(RouteMapper::identity(data_source), mappers));
        }
    }
    builder.build(RouteCategory::StandardSharding, &tables.to_vec())
}

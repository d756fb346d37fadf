use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::names::{eq_ignore_case, NameSet};
use crate::rule::RuleSet;
use crate::statement::StatementContext;

use super::{RouteCategory, RouteContext, RouteContextBuilder, RouteMapper, RouteUnit};

/// Data source of a table outside the sharding rule: its configured data
/// source, else the only logical data source, else `default-data-source`.
fn single_data_source<'a>(rules: &'a RuleSet, table: &str) -> Option<&'a str> {
    if let Some(data_source) = rules.single().data_source(table) {
        return Some(data_source);
    }
    let data_sources = rules.data_source_names();
    if data_sources.len() == 1 {
        return data_sources.first();
    }
    rules.props().default_data_source.as_deref()
}

/// Routes statements over single tables, optionally joined with broadcast
/// tables. All single tables must live in the same data source.
pub fn route(statement: &StatementContext, rules: &RuleSet) -> Result<RouteContext> {
    let tables = statement.table_names();
    let mut target: Option<&str> = None;
    for table in tables.iter().filter(|t| !rules.is_broadcast_table(t)) {
        let data_source = single_data_source(rules, table).ok_or_else(|| Error::Unroutable {
            tables: vec![table.to_string()],
        })?;
        match target {
            Some(existing) if !eq_ignore_case(existing, data_source) => {
                return Err(Error::UnsupportedStatement {
                    reason: format!(
                        "single tables span data sources {} and {}",
                        existing, data_source
                    ),
                });
            }
            _ => target = Some(data_source),
        }
    }

    let mut builder = RouteContextBuilder::new();
    if let Some(data_source) = target {
        builder.push(RouteUnit::new(
            RouteMapper::identity(data_source),
            tables.iter().map(RouteMapper::identity),
        ));
    }
    debug!(data_source = ?target, "single table routed");
    builder.build(RouteCategory::SingleTable, &tables.to_vec())
}

/// Routes to exactly one target: the first data node of a referenced sharding
/// table, else the default data source, else a random logical data source.
pub fn route_unicast(statement: &StatementContext, rules: &RuleSet) -> Result<RouteContext> {
    let tables = statement.table_names();
    let mut builder = RouteContextBuilder::new();

    let first_node = rules.sharding().and_then(|sharding| {
        tables
            .iter()
            .find_map(|t| sharding.table_rule(t))
            .and_then(|rule| rule.actual_data_nodes().first().map(|node| (rule, node)))
    });
    match first_node {
        Some((rule, node)) => {
            let mappers = tables.iter().map(|t| {
                if eq_ignore_case(t, &rule.logic_table) {
                    RouteMapper::new(t, node.table.clone())
                } else {
                    RouteMapper::identity(t)
                }
            });
            builder.push(RouteUnit::new(RouteMapper::identity(node.data_source.clone()), mappers));
        }
        None => {
            let data_source = choose_data_source(rules, &tables)?;
            builder.push(RouteUnit::new(
                RouteMapper::identity(data_source),
                tables.iter().map(RouteMapper::identity),
            ));
        }
    }
    builder.build(RouteCategory::Unicast, &tables.to_vec())
}

fn choose_data_source(rules: &RuleSet, tables: &NameSet) -> Result<String> {
    let data_sources = rules.data_source_names();
    if let Some(default) = rules.props().default_data_source.as_deref() {
        if let Some(found) = data_sources.get(default) {
            return Ok(found.to_string());
        }
        warn!(default_data_source = default, "default data source is not a logical data source");
    }
    if data_sources.is_empty() {
        return Err(Error::Unroutable {
            tables: tables.to_vec(),
        });
    }
    let index = rand::rng().random_range(0..data_sources.len());
    data_sources
        .iter()
        .nth(index)
        .map(str::to_string)
        .ok_or_else(|| Error::Unroutable {
            tables: tables.to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfiguration;
    use crate::statement::{StatementBuilder, StatementKind};
    use crate::test_support::{order_config, order_rules};

    #[test]
    fn test_single_table_uses_configured_source() {
        let statement = StatementBuilder::new(StatementKind::Select, "SELECT * FROM t_user")
            .table("t_user")
            .build()
            .unwrap();
        let context = route(&statement, &order_rules()).unwrap();
        assert_eq!(context.units()[0].to_string(), "ds_1:t_user");
        assert_eq!(context.category(), &RouteCategory::SingleTable);
    }

    #[test]
    fn test_unknown_table_needs_default() {
        let statement = StatementBuilder::new(StatementKind::Select, "SELECT * FROM t_log")
            .table("t_log")
            .build()
            .unwrap();
        let err = route(&statement, &order_rules()).unwrap_err();
        assert!(matches!(err, Error::Unroutable { .. }));

        let mut config: RuleConfiguration = order_config();
        config.props.default_data_source = Some("ds_0".to_string());
        let rules = RuleSet::build(&config).unwrap();
        let context = route(&statement, &rules).unwrap();
        assert_eq!(context.units()[0].to_string(), "ds_0:t_log");
    }

    #[test]
    fn test_unicast_prefers_first_sharding_node() {
        let statement = StatementBuilder::new(StatementKind::Show, "SHOW COLUMNS FROM t_order")
            .table("t_order")
            .build()
            .unwrap();
        let context = route_unicast(&statement, &order_rules()).unwrap();
        assert_eq!(context.units().len(), 1);
        assert_eq!(context.units()[0].to_string(), "ds_0:t_order_0");
    }

    #[test]
    fn test_unicast_without_tables_picks_one_source() {
        let statement = StatementBuilder::new(StatementKind::Select, "SELECT 1").build().unwrap();
        let rules = order_rules();
        let context = route_unicast(&statement, &rules).unwrap();
        assert!(context.is_single_routing());
        assert!(rules.data_source_names().contains(context.units()[0].data_source()));
    }
}

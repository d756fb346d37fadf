use tracing::debug;

use crate::error::{Error, Result};
use crate::rule::RuleSet;
use crate::statement::StatementContext;

use super::{
    BroadcastScope, RouteCategory, RouteContext, RouteContextBuilder, RouteMapper, RouteUnit,
};

/// Broadcast route.
///
/// `Database` scope yields one unit per logical data source with every table
/// under its own name. `Table` scope yields one unit per actual data node of
/// the first sharding table; bound tables follow by position and broadcast
/// tables keep their names.
pub fn route(
    statement: &StatementContext,
    rules: &RuleSet,
    scope: BroadcastScope,
) -> Result<RouteContext> {
    let tables = statement.table_names();
    let category = RouteCategory::Broadcast(scope);
    let mut builder = RouteContextBuilder::new();

    match scope {
        BroadcastScope::Database => {
            for data_source in rules.data_source_names().iter() {
                builder.push(RouteUnit::new(
                    RouteMapper::identity(data_source),
                    tables.iter().map(RouteMapper::identity),
                ));
            }
        }
        BroadcastScope::Table => {
            let sharding = rules.sharding().ok_or_else(|| Error::Unroutable {
                tables: tables.to_vec(),
            })?;
            let primary = tables
                .iter()
                .find_map(|t| sharding.table_rule(t))
                .ok_or_else(|| Error::Unroutable {
                    tables: tables.to_vec(),
                })?;
            for node in primary.actual_data_nodes() {
                let mut mappers = Vec::with_capacity(tables.len());
                for table in tables.iter() {
                    if table.eq_ignore_ascii_case(&primary.logic_table) {
                        mappers.push(RouteMapper::new(table, node.table.clone()));
                    } else if sharding.is_broadcast_table(table) {
                        mappers.push(RouteMapper::identity(table));
                    } else if sharding.is_sharding_table(table) {
                        let bound = sharding
                            .binding_group(table)
                            .map_or(false, |group| group.contains(&primary.logic_table));
                        if !bound {
                            return Err(Error::UnsupportedStatement {
                                reason: format!(
                                    "cannot broadcast {} together with unbound sharding table {}",
                                    primary.logic_table, table
                                ),
                            });
                        }
                        let actual = sharding.binding_actual_table(
                            &node.data_source,
                            table,
                            &primary.logic_table,
                            &node.table,
                        )?;
                        mappers.push(RouteMapper::new(table, actual));
                    }
                }
                let data_source = RouteMapper::identity(node.data_source.clone());
                builder.push(RouteUnit::new(data_source, mappers));
            }
        }
    }
    debug!(scope = ?scope, units = builder.len(), "broadcast routed");
    builder.build(category, &tables.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{StatementBuilder, StatementKind};
    use crate::test_support::order_rules;

    #[test]
    fn test_alter_index_reaches_every_actual_table() {
        let sql = "ALTER INDEX idx_status ON t_order";
        let statement = StatementBuilder::new(StatementKind::AlterIndex, sql)
            .index("idx_status")
            .table("t_order")
            .build()
            .unwrap();
        let context = route(&statement, &order_rules(), BroadcastScope::Table).unwrap();
        let units: Vec<String> = context.units().iter().map(|u| u.to_string()).collect();
        assert_eq!(
            units,
            vec![
                "ds_0:t_order_0",
                "ds_0:t_order_1",
                "ds_0:t_order_2",
                "ds_1:t_order_0",
                "ds_1:t_order_1",
                "ds_1:t_order_2",
            ]
        );
    }

    #[test]
    fn test_database_scope() {
        let statement = StatementBuilder::new(StatementKind::Transaction, "COMMIT")
            .build()
            .unwrap();
        let context = route(&statement, &order_rules(), BroadcastScope::Database).unwrap();
        assert_eq!(context.data_source_names(), vec!["ds_0", "ds_1"]);
        assert!(context.units().iter().all(|u| u.table_mappers.is_empty()));
    }

    #[test]
    fn test_bound_tables_follow_primary() {
        let sql = "DROP TABLE t_order, t_order_item";
        let statement = StatementBuilder::new(StatementKind::DropTable, sql)
            .table("t_order")
            .table("t_order_item")
            .build()
            .unwrap();
        let context = route(&statement, &order_rules(), BroadcastScope::Table).unwrap();
        assert_eq!(context.units().len(), 6);
        assert_eq!(context.units()[4].to_string(), "ds_1:t_order_1,t_order_item_1");
    }
}

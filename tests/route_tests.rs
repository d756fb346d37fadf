mod common;

use common::{order_rules, rules, unit_names, READWRITE_ENCRYPT_RULES, SHADOW_RULES};
use sqlshard::route::BroadcastScope;
use sqlshard::{
    Arg, Error, ErrorKind, RouteCategory, Router, StatementBuilder, StatementKind, Value,
};

#[test]
fn test_insert_routes_to_single_actual_table() {
    let sql = "INSERT INTO t_order (user_id, order_id, status) VALUES (?, ?, ?)";
    let statement = StatementBuilder::new(StatementKind::Insert, sql)
        .table("t_order")
        .insert_columns(&["user_id", "order_id", "status"])
        .insert_row(&[Arg::Param, Arg::Param, Arg::Param])
        .build()
        .unwrap();
    let rules = order_rules();
    let parameters = [Value::Int(10), Value::Int(4), Value::from("NEW")];
    let context = Router::new(&rules).route(&statement, &parameters).unwrap();

    assert_eq!(context.category(), &RouteCategory::StandardSharding);
    assert_eq!(unit_names(&context), vec!["ds_0:t_order_1"]);
    assert!(context.is_single_routing());
}

#[test]
fn test_alter_index_broadcasts_to_every_actual_table() {
    let sql = "ALTER INDEX idx_status ON t_order";
    let statement = StatementBuilder::new(StatementKind::AlterIndex, sql)
        .index("idx_status")
        .table("t_order")
        .build()
        .unwrap();
    let rules = order_rules();
    let context = Router::new(&rules).route(&statement, &[]).unwrap();

    assert_eq!(context.category(), &RouteCategory::Broadcast(BroadcastScope::Table));
    assert_eq!(
        unit_names(&context),
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
fn test_shadow_hint_routes_to_shadow_data_source() {
    let sql = "/* shadow:true */ SELECT * FROM t_user WHERE id = ?";
    let statement = StatementBuilder::new(StatementKind::Select, sql)
        .comment()
        .table("t_user")
        .equal("id", Arg::Param)
        .build()
        .unwrap();
    let rules = rules(SHADOW_RULES);
    let context = Router::new(&rules).route(&statement, &[Value::Int(1)]).unwrap();

    assert_eq!(context.category(), &RouteCategory::Shadow);
    assert_eq!(context.units().len(), 1);
    assert_eq!(context.units()[0].data_source(), "ds_shadow");
    assert_eq!(context.units()[0].logic_data_source(), "ds");
}

#[test]
fn test_shadow_column_value_routes_to_shadow_data_source() {
    let sql = "INSERT INTO t_user (id, user_type) VALUES (?, ?)";
    let statement = StatementBuilder::new(StatementKind::Insert, sql)
        .table("t_user")
        .insert_columns(&["id", "user_type"])
        .insert_row(&[Arg::Param, Arg::Param])
        .build()
        .unwrap();
    let rules = rules(SHADOW_RULES);

    let shadow = Router::new(&rules)
        .route(&statement, &[Value::Int(7), Value::Int(1)])
        .unwrap();
    assert_eq!(unit_names(&shadow), vec!["ds_shadow:t_user"]);

    let production = Router::new(&rules)
        .route(&statement, &[Value::Int(7), Value::Int(0)])
        .unwrap();
    assert_eq!(production.category(), &RouteCategory::SingleTable);
    assert_eq!(unit_names(&production), vec!["ds:t_user"]);
}

#[test]
fn test_binding_tables_share_suffix() {
    let sql = "SELECT * FROM t_order o JOIN t_order_item i ON o.order_id = i.order_id \
               WHERE o.user_id = 1 AND o.order_id = 5";
    let statement = StatementBuilder::new(StatementKind::Select, sql)
        .table_as("t_order", "o")
        .table_as("t_order_item", "i")
        .equal("o.user_id", Arg::lit(1))
        .equal("o.order_id", Arg::lit(5))
        .build()
        .unwrap();
    let rules = order_rules();
    let context = Router::new(&rules).route(&statement, &[]).unwrap();
    assert_eq!(unit_names(&context), vec!["ds_1:t_order_2,t_order_item_2"]);
}

#[test]
fn test_reads_and_writes_split() {
    let rules = rules(READWRITE_ENCRYPT_RULES);
    let router = Router::new(&rules);

    let read = StatementBuilder::new(StatementKind::Select, "SELECT * FROM t_user")
        .table("t_user")
        .build()
        .unwrap();
    let context = router.route(&read, &[]).unwrap();
    assert_eq!(context.category(), &RouteCategory::SingleTable);
    assert_eq!(context.data_source_names(), vec!["ds_replica_0"]);

    let write = StatementBuilder::new(StatementKind::Delete, "DELETE FROM t_user WHERE id = 1")
        .table("t_user")
        .equal("id", Arg::lit(1))
        .build()
        .unwrap();
    assert_eq!(router.route(&write, &[]).unwrap().data_source_names(), vec!["ds_primary"]);

    let hint_sql = "/* write_route_only */ SELECT * FROM t_user";
    let hinted = StatementBuilder::new(StatementKind::Select, hint_sql)
        .comment()
        .table("t_user")
        .build()
        .unwrap();
    assert_eq!(router.route(&hinted, &[]).unwrap().data_source_names(), vec!["ds_primary"]);
}

#[test]
fn test_mixed_rule_scopes_fail_fast() {
    let sql = "SELECT * FROM t_order JOIN t_user ON t_order.user_id = t_user.id";
    let statement = StatementBuilder::new(StatementKind::Select, sql)
        .table("t_order")
        .table("t_user")
        .build()
        .unwrap();
    let rules = order_rules();
    let err = Router::new(&rules).route(&statement, &[]).unwrap_err();
    assert!(matches!(err, Error::UnsupportedStatement { .. }));
    assert_eq!(err.kind(), ErrorKind::Routing);
}

#[test]
fn test_unavailable_target_reports_available_set() {
    let json = common::ORDER_RULES.replace("\"sharding-count\": 3", "\"sharding-count\": 4");
    let rules = rules(&json);
    let sql = "SELECT * FROM t_order WHERE user_id = 0 AND order_id = 3";
    let statement = StatementBuilder::new(StatementKind::Select, sql)
        .table("t_order")
        .equal("user_id", Arg::lit(0))
        .equal("order_id", Arg::lit(3))
        .build()
        .unwrap();
    match Router::new(&rules).route(&statement, &[]).unwrap_err() {
        Error::TargetNotAvailable { table, target, available, .. } => {
            assert_eq!(table, "t_order");
            assert_eq!(target, "t_order_3");
            assert_eq!(available.len(), 3);
        }
        other => panic!("unexpected error: {}", other),
    }
}

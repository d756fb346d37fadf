mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{order_rules, query, unit_names};
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;
use sqlshard::{Arg, Kernel, Router, StatementBuilder, StatementKind, Value};

fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

// Property: equality on both sharding columns lands on exactly the node the
// modulo algorithms name.
proptest! {
    #[test]
    fn prop_equality_routes_to_one_node(user_id in -1000i64..1000, order_id in -1000i64..1000) {
        let sql = "SELECT * FROM t_order WHERE user_id = ? AND order_id = ?";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_order")
            .equal("user_id", Arg::Param)
            .equal("order_id", Arg::Param)
            .build()
            .unwrap();
        let rules = order_rules();
        let context = Router::new(&rules)
            .route(&statement, &[Value::Int(user_id), Value::Int(order_id)])
            .unwrap();
        let expected = format!("ds_{}:t_order_{}", user_id.rem_euclid(2), order_id.rem_euclid(3));
        prop_assert_eq!(unit_names(&context), vec![expected]);
    }
}

// Property: range routing never yields duplicate units and stays inside the
// configured nodes.
proptest! {
    #[test]
    fn prop_range_units_are_distinct(low in -50i64..50, width in 0i64..10) {
        let sql = "SELECT * FROM t_order WHERE order_id BETWEEN ? AND ?";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_order")
            .between("order_id", Arg::Param, Arg::Param)
            .build()
            .unwrap();
        let rules = order_rules();
        let context = Router::new(&rules)
            .route(&statement, &[Value::Int(low), Value::Int(low + width)])
            .unwrap();
        let names = unit_names(&context);
        let distinct: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(distinct.len(), names.len());
        prop_assert!(names.len() <= 6);
        prop_assert!(!names.is_empty());
    }
}

// Property: every IN item reaches exactly one unit and parameters stay aligned
// with placeholders.
proptest! {
    #[test]
    fn prop_in_items_partitioned(order_ids in prop_vec(0i64..100, 2..8)) {
        let distinct: HashSet<i64> = order_ids.iter().copied().collect();
        prop_assume!(distinct.len() == order_ids.len());

        let markers = vec!["?"; order_ids.len()].join(", ");
        let sql = format!("SELECT * FROM t_order WHERE user_id = 0 AND order_id IN ({})", markers);
        let args = vec![Arg::Param; order_ids.len()];
        let statement = StatementBuilder::new(StatementKind::Select, &sql)
            .table("t_order")
            .equal("user_id", Arg::lit(0))
            .in_list("order_id", &args)
            .build()
            .unwrap();
        let parameters: Vec<Value> = order_ids.iter().copied().map(Value::Int).collect();
        let kernel = Kernel::new(Arc::new(order_rules()));
        let context = kernel
            .generate_execution_context(&query(&sql, statement, &parameters))
            .unwrap();

        let mut seen = Vec::new();
        for unit in context.units() {
            prop_assert_eq!(placeholders(&unit.sql), unit.parameters.len());
            for value in &unit.parameters {
                let id = value.as_i64().unwrap();
                let expected_table = format!("t_order_{} ", id.rem_euclid(3));
                prop_assert!(
                    unit.sql.contains(&expected_table),
                    "{} not in {}",
                    expected_table,
                    unit.sql
                );
                seen.push(id);
            }
        }
        seen.sort_unstable();
        let mut expected = order_ids.clone();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }
}

// Property: each INSERT row is sent exactly once.
proptest! {
    #[test]
    fn prop_insert_rows_sent_once(rows in prop_vec((0i64..10, 0i64..100), 1..6)) {
        let values = vec!["(?, ?)"; rows.len()].join(", ");
        let sql = format!("INSERT INTO t_order (user_id, order_id) VALUES {}", values);
        let mut builder = StatementBuilder::new(StatementKind::Insert, &sql)
            .table("t_order")
            .insert_columns(&["user_id", "order_id"]);
        for _ in &rows {
            builder = builder.insert_row(&[Arg::Param, Arg::Param]);
        }
        let statement = builder.build().unwrap();
        let parameters: Vec<Value> = rows
            .iter()
            .flat_map(|&(user_id, order_id)| [Value::Int(user_id), Value::Int(order_id)])
            .collect();
        let kernel = Kernel::new(Arc::new(order_rules()));
        let context = kernel
            .generate_execution_context(&query(&sql, statement, &parameters))
            .unwrap();

        let mut sent = Vec::new();
        for unit in context.units() {
            prop_assert_eq!(placeholders(&unit.sql), unit.parameters.len());
            for pair in unit.parameters.chunks(2) {
                let user_id = pair[0].as_i64().unwrap();
                prop_assert!(unit.data_source.ends_with(&user_id.rem_euclid(2).to_string()));
                sent.push((user_id, pair[1].as_i64().unwrap()));
            }
        }
        let mut expected = rows.clone();
        expected.sort_unstable();
        sent.sort_unstable();
        prop_assert_eq!(sent, expected);
    }
}

// Property: the pagination window only widens when more than one unit runs.
proptest! {
    #[test]
    fn prop_pagination_window(
        offset in 0i64..1000,
        row_count in 1i64..1000,
        single in any::<bool>(),
    ) {
        let sql = if single {
            "SELECT * FROM t_order WHERE user_id = 0 AND order_id = 0 LIMIT ?, ?"
        } else {
            "SELECT * FROM t_order WHERE user_id = 0 LIMIT ?, ?"
        };
        let mut builder = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_order")
            .equal("user_id", Arg::lit(0));
        if single {
            builder = builder.equal("order_id", Arg::lit(0));
        }
        let statement = builder.offset(Arg::Param).row_count(Arg::Param).build().unwrap();
        let parameters = [Value::Int(offset), Value::Int(row_count)];
        let kernel = Kernel::new(Arc::new(order_rules()));
        let context = kernel
            .generate_execution_context(&query(sql, statement, &parameters))
            .unwrap();

        let expected = if single {
            vec![Value::Int(offset), Value::Int(row_count)]
        } else {
            vec![Value::Int(0), Value::Int(offset + row_count)]
        };
        prop_assert_eq!(context.units().len(), if single { 1 } else { 3 });
        for unit in context.units() {
            prop_assert_eq!(&unit.parameters, &expected);
        }
    }
}

// Property: assembling keeps every byte outside the tokens and places each
// replacement in token order.
proptest! {
    #[test]
    fn prop_assemble_keeps_gaps(cuts in prop_vec(0usize..48, 0..12), seed in 0u8..3) {
        use sqlshard::rewrite::{assemble, SqlToken, TokenKind};

        let sql = "SELECT id, name FROM t_order WHERE id > 10 LIMIT 5";
        let mut cuts = cuts;
        cuts.sort_unstable();
        cuts.dedup();
        let tokens: Vec<SqlToken> = cuts
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                let kind = match (i as u8 + seed) % 3 {
                    0 => TokenKind::Literal { text: format!("<{}>", i) },
                    1 => TokenKind::Remove,
                    _ => TokenKind::Pagination { value: i as i64 },
                };
                SqlToken::new(pair[0], pair[1], kind)
            })
            .collect();

        let rewritten = assemble(sql, &tokens, None);
        let consumed: usize = tokens.iter().map(|t| t.stop_index + 1 - t.start_index).sum();
        let replaced: usize = tokens.iter().map(|t| t.to_text(None).len()).sum();
        prop_assert_eq!(rewritten.len(), sql.len() - consumed + replaced);

        let mut cursor = 0;
        let mut at = 0;
        for token in &tokens {
            let gap = &sql[cursor..token.start_index];
            prop_assert_eq!(&rewritten[at..at + gap.len()], gap);
            at += gap.len();
            let text = token.to_text(None);
            prop_assert_eq!(&rewritten[at..at + text.len()], text.as_str());
            at += text.len();
            cursor = token.stop_index + 1;
        }
        prop_assert_eq!(&rewritten[at..], &sql[cursor..]);
    }
}

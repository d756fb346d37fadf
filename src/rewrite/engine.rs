//! SQL rewrite assembler.

use tracing::debug;

use crate::error::Result;
use crate::route::{RouteContext, RouteUnit};
use crate::rule::RuleSet;
use crate::statement::StatementContext;
use crate::value::Value;

use super::context::SqlRewriteContext;
use super::decorator::decorators;
use super::parameter::ParameterBuilder;
use super::token::SqlToken;

/// SQL text and parameters for one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRewriteUnit {
    pub sql: String,
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlRewriteResult {
    /// The logical SQL is valid as is for the single target.
    Identity(SqlRewriteUnit),
    /// One rewritten unit per route unit, in route order.
    RouteUnits(Vec<(RouteUnit, SqlRewriteUnit)>),
}

impl SqlRewriteResult {
    pub fn is_identity(&self) -> bool {
        matches!(self, SqlRewriteResult::Identity(_))
    }
}

/// Applies `tokens` (sorted, non-overlapping) to `sql` for `unit`.
pub fn assemble(sql: &str, tokens: &[SqlToken], unit: Option<&RouteUnit>) -> String {
    let mut result = String::with_capacity(sql.len() + 16 * tokens.len());
    let mut cursor = 0;
    for token in tokens {
        result.push_str(&sql[cursor..token.start_index]);
        result.push_str(&token.to_text(unit));
        cursor = token.stop_index + 1;
    }
    result.push_str(&sql[cursor..]);
    result
}

#[derive(Debug, Clone, Copy)]
pub struct SqlRewriteEngine<'a> {
    rules: &'a RuleSet,
}

impl<'a> SqlRewriteEngine<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    pub fn rewrite(
        &self,
        sql: &str,
        statement: &StatementContext,
        parameters: &[Value],
        route_context: &RouteContext,
    ) -> Result<SqlRewriteResult> {
        let mut context = SqlRewriteContext::new(sql, statement, parameters);
        for decorator in decorators() {
            if decorator.is_applicable(statement, self.rules) {
                debug!(decorator = decorator.name(), "rewrite decorator applied");
                decorator.decorate(self.rules, &mut context, route_context)?;
            }
        }
        context.generate(route_context)?;
        Ok(rewrite_units(sql, context.tokens(), context.parameter_builder(), route_context))
    }
}

fn rewrite_units(
    sql: &str,
    tokens: &[SqlToken],
    parameters: &ParameterBuilder,
    route_context: &RouteContext,
) -> SqlRewriteResult {
    let units = route_context.units();
    if units.len() <= 1 && tokens.is_empty() {
        return SqlRewriteResult::Identity(SqlRewriteUnit {
            sql: sql.to_string(),
            parameters: parameters.build(units.first()),
        });
    }
    SqlRewriteResult::RouteUnits(
        units
            .iter()
            .map(|unit| {
                let rewritten = SqlRewriteUnit {
                    sql: assemble(sql, tokens, Some(unit)),
                    parameters: parameters.build(Some(unit)),
                };
                (unit.clone(), rewritten)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Router;
    use crate::statement::{Arg, StatementBuilder, StatementKind};
    use crate::test_support::order_rules;

    fn rewrite(sql: &str, statement: &StatementContext, parameters: &[Value]) -> SqlRewriteResult {
        let rules = order_rules();
        let route_context = Router::new(&rules).route(statement, parameters).unwrap();
        SqlRewriteEngine::new(&rules)
            .rewrite(sql, statement, parameters, &route_context)
            .unwrap()
    }

    fn units(result: &SqlRewriteResult) -> Vec<(String, String, Vec<Value>)> {
        match result {
            SqlRewriteResult::RouteUnits(units) => units
                .iter()
                .map(|(unit, r)| {
                    let data_source = unit.data_source().to_string();
                    (data_source, r.sql.clone(), r.parameters.clone())
                })
                .collect(),
            SqlRewriteResult::Identity(r) => {
                vec![(String::new(), r.sql.clone(), r.parameters.clone())]
            }
        }
    }

    #[test]
    fn test_single_table_is_identity() {
        let sql = "SELECT * FROM t_user WHERE id = ?";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_user")
            .equal("id", Arg::Param)
            .build()
            .unwrap();
        let result = rewrite(sql, &statement, &[Value::Int(1)]);
        assert!(result.is_identity());
        assert_eq!(units(&result), vec![(String::new(), sql.to_string(), vec![Value::Int(1)])]);
    }

    #[test]
    fn test_insert_rewritten_to_actual_table() {
        let sql = "INSERT INTO t_order (user_id, order_id) VALUES (?, ?)";
        let statement = StatementBuilder::new(StatementKind::Insert, sql)
            .table("t_order")
            .insert_columns(&["user_id", "order_id"])
            .insert_row(&[Arg::Param, Arg::Param])
            .build()
            .unwrap();
        let result = rewrite(sql, &statement, &[Value::Int(2), Value::Int(4)]);
        assert_eq!(
            units(&result),
            vec![(
                "ds_0".to_string(),
                "INSERT INTO t_order_1 (user_id, order_id) VALUES (?, ?)".to_string(),
                vec![Value::Int(2), Value::Int(4)],
            )]
        );
    }

    #[test]
    fn test_in_list_split_across_units() {
        let sql = "SELECT * FROM t_order WHERE user_id = 0 AND order_id IN (?, ?, ?)";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_order")
            .equal("user_id", Arg::lit(0))
            .in_list("order_id", &[Arg::Param, Arg::Param, Arg::Param])
            .build()
            .unwrap();
        let result = rewrite(sql, &statement, &[Value::Int(3), Value::Int(4), Value::Int(6)]);
        assert_eq!(
            units(&result),
            vec![
                (
                    "ds_0".to_string(),
                    "SELECT * FROM t_order_0 WHERE user_id = 0 AND order_id IN (?, ?)".to_string(),
                    vec![Value::Int(3), Value::Int(6)],
                ),
                (
                    "ds_0".to_string(),
                    "SELECT * FROM t_order_1 WHERE user_id = 0 AND order_id IN (?)".to_string(),
                    vec![Value::Int(4)],
                ),
            ]
        );
    }

    #[test]
    fn test_pagination_window_widened() {
        let sql = "SELECT * FROM t_order ORDER BY order_id LIMIT 10, 5";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_order")
            .column("order_id")
            .offset(Arg::lit(10))
            .row_count(Arg::lit(5))
            .build()
            .unwrap();
        let result = rewrite(sql, &statement, &[]);
        let units = units(&result);
        assert_eq!(units.len(), 6);
        assert_eq!(units[0].1, "SELECT * FROM t_order_0 ORDER BY order_id LIMIT 0, 15");
    }

    #[test]
    fn test_assemble_without_tokens_is_identity() {
        assert_eq!(assemble("SELECT 1", &[], None), "SELECT 1");
    }

    #[test]
    fn test_assemble_applies_tokens_in_order() {
        use crate::rewrite::token::TokenKind;
        use crate::route::RouteMapper;

        let sql = "/* hint */ SELECT * FROM t_order WHERE id = 1 LIMIT 10, 5";
        let table = sql.find("t_order").unwrap();
        let offset = sql.find("10").unwrap();
        let row_count = sql.rfind('5').unwrap();
        let tokens = vec![
            SqlToken::new(0, 9, TokenKind::Remove),
            SqlToken::new(
                table,
                table + 6,
                TokenKind::Table {
                    logic_table: "t_order".to_string(),
                    quote: None,
                },
            ),
            SqlToken::new(offset, offset + 1, TokenKind::Pagination { value: 0 }),
            SqlToken::new(row_count, row_count, TokenKind::Pagination { value: 15 }),
        ];
        let unit = RouteUnit::new(
            RouteMapper::identity("ds_0"),
            [RouteMapper::new("t_order", "t_order_1")],
        );

        let rewritten = assemble(sql, &tokens, Some(&unit));
        assert_eq!(rewritten, " SELECT * FROM t_order_1 WHERE id = 1 LIMIT 0, 15");

        let consumed: usize = tokens.iter().map(|t| t.stop_index + 1 - t.start_index).sum();
        let replaced: usize = tokens.iter().map(|t| t.to_text(Some(&unit)).len()).sum();
        assert_eq!(rewritten.len(), sql.len() - consumed + replaced);

        // Text between tokens survives untouched.
        for gap in [" SELECT * FROM ", " WHERE id = 1 LIMIT ", ", "] {
            assert!(rewritten.contains(gap), "{}", gap);
        }
        assert_eq!(
            assemble(sql, &tokens, None),
            " SELECT * FROM t_order WHERE id = 1 LIMIT 0, 15"
        );
    }
}

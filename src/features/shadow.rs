use crate::config::ShadowRuleConfiguration;
use crate::error::Result;
use crate::names::{eq_ignore_case, NameMap};
use crate::statement::{CommentSegment, PredicateOperator, StatementContext};
use crate::value::Value;

use super::comments_with_marker;

#[derive(Debug, Clone)]
struct ShadowColumn {
    column: String,
    values: Vec<Value>,
}

/// Production to shadow data source mapping plus detection settings.
#[derive(Debug, Clone)]
pub struct ShadowRule {
    data_sources: NameMap<String>,
    tables: NameMap<ShadowColumn>,
    hint_marker: String,
}

impl ShadowRule {
    pub fn build(config: &ShadowRuleConfiguration) -> Self {
        let mut data_sources = NameMap::new();
        for mapping in &config.data_sources {
            data_sources.insert(
                mapping.production_data_source.clone(),
                mapping.shadow_data_source.clone(),
            );
        }
        let mut tables = NameMap::new();
        for table in &config.tables {
            tables.insert(
                table.table.clone(),
                ShadowColumn {
                    column: table.column.clone(),
                    values: table.values.clone(),
                },
            );
        }
        Self {
            data_sources,
            tables,
            hint_marker: config.hint_marker.clone(),
        }
    }

    pub fn shadow_data_source(&self, production: &str) -> Option<&str> {
        self.data_sources.get(production).map(String::as_str)
    }

    pub fn hint_marker(&self) -> &str {
        &self.hint_marker
    }

    pub fn hint_comments<'a>(&self, statement: &'a StatementContext) -> Vec<&'a CommentSegment> {
        comments_with_marker(statement, &self.hint_marker)
    }

    pub fn governs(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Shadow when a comment carries the marker, or when a shadow table's
    /// column only takes configured shadow values (every inserted row, or an
    /// equality / IN predicate).
    pub fn is_shadow(&self, statement: &StatementContext, parameters: &[Value]) -> Result<bool> {
        if !self.hint_comments(statement).is_empty() {
            return Ok(true);
        }
        for table in &statement.tables {
            let shadow = match self.tables.get(&table.name) {
                Some(shadow) => shadow,
                None => continue,
            };
            if let Some(insert) = &statement.insert {
                if let Some(position) = insert.column_position(&shadow.column) {
                    let mut all = !insert.rows.is_empty();
                    for row in &insert.rows {
                        match row.values.get(position) {
                            Some(expr) => all &= shadow.values.contains(&expr.resolve(parameters)?),
                            None => all = false,
                        }
                    }
                    if all {
                        return Ok(true);
                    }
                }
            }
            for predicate in &statement.predicates {
                if !eq_ignore_case(&predicate.column.name, &shadow.column)
                    || statement
                        .column_table(&predicate.column)
                        .map_or(false, |t| !eq_ignore_case(t, &table.name))
                {
                    continue;
                }
                let values = match &predicate.operator {
                    PredicateOperator::Equal(value) => vec![value.resolve(parameters)?],
                    PredicateOperator::In(values) => values
                        .iter()
                        .map(|v| v.resolve(parameters))
                        .collect::<Result<Vec<_>>>()?,
                    _ => continue,
                };
                if !values.is_empty() && values.iter().all(|v| shadow.values.contains(v)) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShadowDataSourceConfiguration, ShadowTableConfiguration};
    use crate::statement::{Arg, StatementBuilder, StatementKind};

    fn rule() -> ShadowRule {
        ShadowRule::build(&ShadowRuleConfiguration {
            data_sources: vec![ShadowDataSourceConfiguration {
                production_data_source: "ds".to_string(),
                shadow_data_source: "ds_shadow".to_string(),
            }],
            tables: vec![ShadowTableConfiguration {
                table: "t_user".to_string(),
                column: "user_type".to_string(),
                values: vec![Value::Int(1)],
            }],
            ..Default::default()
        })
    }

    #[test]
    fn test_hint_marker() {
        let sql = "/* SHADOW: true */ SELECT * FROM t_order";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .comment()
            .table("t_order")
            .build()
            .unwrap();
        assert!(rule().is_shadow(&statement, &[]).unwrap());
        assert_eq!(rule().shadow_data_source("DS"), Some("ds_shadow"));
    }

    #[test]
    fn test_column_value_detection() {
        let sql = "INSERT INTO t_user (id, user_type) VALUES (1, ?), (2, ?)";
        let statement = StatementBuilder::new(StatementKind::Insert, sql)
            .table("t_user")
            .insert_columns(&["id", "user_type"])
            .insert_row(&[Arg::lit(1), Arg::Param])
            .insert_row(&[Arg::lit(2), Arg::Param])
            .build()
            .unwrap();
        let rule = rule();
        assert!(rule.is_shadow(&statement, &[Value::Int(1), Value::Int(1)]).unwrap());
        assert!(!rule.is_shadow(&statement, &[Value::Int(1), Value::Int(0)]).unwrap());

        let sql = "SELECT * FROM t_user WHERE user_type = 1";
        let statement = StatementBuilder::new(StatementKind::Select, sql)
            .table("t_user")
            .equal("user_type", Arg::lit(1))
            .build()
            .unwrap();
        assert!(rule.is_shadow(&statement, &[]).unwrap());
    }
}

//! Derives sharding condition values from a bound statement.
//!
//! WHERE predicates are treated as one conjunction: conditions on the same
//! column are intersected. Each INSERT row becomes its own condition so rows
//! can route independently.

use tracing::trace;

use crate::error::{Error, Result};
use crate::sharding::rule::ShardingRule;
use crate::sharding::value::{ConditionKind, ShardingConditionValue, ShardingRange};
use crate::statement::{
    ColumnSegment, CompareOperator, PredicateOperator, StatementContext, StatementKind,
};
use crate::value::Value;

/// Condition values that hold together, e.g. one INSERT row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShardingCondition {
    pub values: Vec<ShardingConditionValue>,
    /// Index of the INSERT row this condition came from.
    pub row: Option<usize>,
}

impl ShardingCondition {
    fn add(&mut self, value: ShardingConditionValue) {
        match self
            .values
            .iter_mut()
            .find(|existing| existing.is_for(&value.table, &value.column))
        {
            Some(existing) => *existing = existing.merge(&value),
            None => self.values.push(value),
        }
    }

    pub fn is_always_false(&self) -> bool {
        self.values.iter().any(ShardingConditionValue::is_always_false)
    }

    pub fn values_for(&self, table: &str) -> Vec<ShardingConditionValue> {
        self.values
            .iter()
            .filter(|v| v.table.eq_ignore_ascii_case(table))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShardingConditions {
    pub conditions: Vec<ShardingCondition>,
}

impl ShardingConditions {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when the statement can match no row at all.
    pub fn is_always_false(&self) -> bool {
        !self.conditions.is_empty()
            && self.conditions.iter().all(ShardingCondition::is_always_false)
    }
}

/// Builds the sharding conditions of `statement` under `rule`.
pub fn extract(
    statement: &StatementContext,
    parameters: &[Value],
    rule: &ShardingRule,
) -> Result<ShardingConditions> {
    let conditions = match statement.kind {
        StatementKind::Insert => insert_conditions(statement, parameters, rule)?,
        _ => {
            let condition = where_condition(statement, parameters, rule)?;
            if statement.kind == StatementKind::Update {
                check_sharding_assignments(statement, parameters, rule, &condition)?;
            }
            if condition.values.is_empty() {
                Vec::new()
            } else {
                vec![condition]
            }
        }
    };
    trace!(count = conditions.len(), "sharding conditions extracted");
    Ok(ShardingConditions { conditions })
}

fn insert_conditions(
    statement: &StatementContext,
    parameters: &[Value],
    rule: &ShardingRule,
) -> Result<Vec<ShardingCondition>> {
    let (insert, table) = match (&statement.insert, statement.tables.first()) {
        (Some(insert), Some(table)) if rule.is_sharding_table(&table.name) => (insert, &table.name),
        _ => return Ok(Vec::new()),
    };
    let sharding_columns: Vec<(usize, &str)> = insert
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| rule.is_sharding_column(&c.name, table))
        .map(|(i, c)| (i, c.name.as_str()))
        .collect();

    let mut conditions = Vec::with_capacity(insert.rows.len());
    for (row_index, row) in insert.rows.iter().enumerate() {
        let mut condition = ShardingCondition {
            values: Vec::new(),
            row: Some(row_index),
        };
        for (position, column) in &sharding_columns {
            let expr = row.values.get(*position).ok_or_else(|| {
                Error::Binding(format!(
                    "row {} has {} values but column {} is at position {}",
                    row_index,
                    row.values.len(),
                    column,
                    position
                ))
            })?;
            condition.add(ShardingConditionValue::list(
                table.clone(),
                *column,
                vec![expr.resolve(parameters)?],
            ));
        }
        conditions.push(condition);
    }
    Ok(conditions)
}

fn where_condition(
    statement: &StatementContext,
    parameters: &[Value],
    rule: &ShardingRule,
) -> Result<ShardingCondition> {
    let mut condition = ShardingCondition::default();
    for predicate in &statement.predicates {
        let tables = sharding_tables_for(statement, &predicate.column, rule);
        if tables.is_empty() {
            continue;
        }
        let kind = match &predicate.operator {
            PredicateOperator::Equal(value) => {
                ConditionKind::List(vec![value.resolve(parameters)?])
            }
            PredicateOperator::In(values) => ConditionKind::List(
                values
                    .iter()
                    .map(|v| v.resolve(parameters))
                    .collect::<Result<Vec<_>>>()?,
            ),
            PredicateOperator::Between(low, high) => ConditionKind::Range(ShardingRange::closed(
                low.resolve(parameters)?,
                high.resolve(parameters)?,
            )),
            PredicateOperator::Compare(operator, value) => {
                let value = value.resolve(parameters)?;
                ConditionKind::Range(match operator {
                    CompareOperator::GreaterThan => ShardingRange::greater_than(value),
                    CompareOperator::GreaterOrEqual => ShardingRange::at_least(value),
                    CompareOperator::LessThan => ShardingRange::less_than(value),
                    CompareOperator::LessOrEqual => ShardingRange::at_most(value),
                })
            }
        };
        for table in tables {
            condition.add(ShardingConditionValue {
                table,
                column: predicate.column.name.clone(),
                kind: kind.clone(),
            });
        }
    }
    Ok(condition)
}

/// Sharding tables a column may belong to. Unqualified columns in multi-table
/// statements apply to every referenced table sharded by that column.
pub fn sharding_tables_for(
    statement: &StatementContext,
    column: &ColumnSegment,
    rule: &ShardingRule,
) -> Vec<String> {
    match statement.column_table(column) {
        Some(table) if rule.is_sharding_column(&column.name, table) => vec![table.to_string()],
        Some(_) => Vec::new(),
        None if column.owner.is_some() => Vec::new(),
        None => statement
            .table_names()
            .iter()
            .filter(|t| rule.is_sharding_column(&column.name, t))
            .map(str::to_string)
            .collect(),
    }
}

/// Sharding columns may only be "updated" to the value already selected by WHERE.
fn check_sharding_assignments(
    statement: &StatementContext,
    parameters: &[Value],
    rule: &ShardingRule,
    condition: &ShardingCondition,
) -> Result<()> {
    for assignment in &statement.assignments {
        for table in sharding_tables_for(statement, &assignment.column, rule) {
            let new_value = assignment.value.resolve(parameters)?;
            let unchanged = condition
                .values
                .iter()
                .find(|v| v.is_for(&table, &assignment.column.name))
                .map_or(false, |v| is_single_value(&v.kind, &new_value));
            if !unchanged {
                return Err(Error::UnsupportedStatement {
                    reason: format!(
                        "cannot update sharding column {}.{} to {}",
                        table, assignment.column.name, new_value
                    ),
                });
            }
        }
    }
    Ok(())
}

fn is_single_value(kind: &ConditionKind, value: &Value) -> bool {
    matches!(kind, ConditionKind::List(values) if values.len() == 1 && values[0] == *value)
}

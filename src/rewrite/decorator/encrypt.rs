use tracing::warn;

use crate::error::Result;
use crate::features::{EncryptColumn, EncryptRule};
use crate::names::eq_ignore_case;
use crate::route::RouteContext;
use crate::rule::RuleSet;
use crate::statement::{ColumnSegment, PredicateOperator, StatementContext, ValueExpr};

use super::RewriteDecorator;
use crate::rewrite::context::{
    GenerateContext, ParameterRewriter, SqlRewriteContext, SqlTokenGenerator,
};
use crate::rewrite::parameter::ParameterBuilder;
use crate::rewrite::token::{SqlToken, TokenKind};

/// Stores configured columns as cipher columns holding encrypted values.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptDecorator;

impl RewriteDecorator for EncryptDecorator {
    fn name(&self) -> &'static str {
        "encrypt"
    }

    fn is_applicable(&self, statement: &StatementContext, rules: &RuleSet) -> bool {
        rules
            .encrypt()
            .map_or(false, |rule| statement.tables.iter().any(|t| rule.governs(&t.name)))
    }

    fn decorate<'a>(
        &self,
        rules: &'a RuleSet,
        context: &mut SqlRewriteContext<'a>,
        _route_context: &RouteContext,
    ) -> Result<()> {
        if let Some(rule) = rules.encrypt() {
            context.add_generator(EncryptTokenGenerator { rule });
            context.add_parameter_rewriter(EncryptParameterRewriter { rule });
        }
        Ok(())
    }
}

/// Encrypt column a column segment refers to. Unqualified columns in
/// multi-table statements match the first referenced table that encrypts them.
fn encrypt_column<'r>(
    statement: &StatementContext,
    column: &ColumnSegment,
    rule: &'r EncryptRule,
) -> Option<&'r EncryptColumn> {
    match statement.column_table(column) {
        Some(table) => rule.column(table, &column.name),
        None if column.owner.is_some() => None,
        None => statement
            .tables
            .iter()
            .find_map(|t| rule.column(&t.name, &column.name)),
    }
}

/// Every value bound to an encrypted column, with the column.
fn encrypted_values<'s, 'r>(
    statement: &'s StatementContext,
    rule: &'r EncryptRule,
) -> Vec<(&'s ValueExpr, &'r EncryptColumn)> {
    let mut values = Vec::new();
    for predicate in &statement.predicates {
        let column = match encrypt_column(statement, &predicate.column, rule) {
            Some(column) => column,
            None => continue,
        };
        match &predicate.operator {
            PredicateOperator::Equal(value) => values.push((value, column)),
            PredicateOperator::In(items) => values.extend(items.iter().map(|v| (v, column))),
            PredicateOperator::Between(..) | PredicateOperator::Compare(..) => {
                warn!(
                    column = %predicate.column.name,
                    "range predicate on encrypted column left as is"
                );
            }
        }
    }
    if let Some(insert) = &statement.insert {
        for (position, segment) in insert.columns.iter().enumerate() {
            if let Some(column) = encrypt_column(statement, segment, rule) {
                values.extend(
                    insert
                        .rows
                        .iter()
                        .filter_map(|row| row.values.get(position))
                        .map(|v| (v, column)),
                );
            }
        }
    }
    for assignment in &statement.assignments {
        if let Some(column) = encrypt_column(statement, &assignment.column, rule) {
            values.push((&assignment.value, column));
        }
    }
    values
}

struct EncryptTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl SqlTokenGenerator for EncryptTokenGenerator<'_> {
    fn name(&self) -> &'static str {
        "encrypt"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        let statement = context.statement;
        let mut tokens = Vec::new();
        for segment in statement.all_columns() {
            if let Some(column) = encrypt_column(statement, segment, self.rule) {
                if !eq_ignore_case(&column.cipher_column, &segment.name) {
                    tokens.push(SqlToken::new(
                        segment.start_index,
                        segment.stop_index,
                        TokenKind::Column {
                            name: column.cipher_column.clone(),
                            quote: segment.quote,
                        },
                    ));
                }
            }
        }
        for (value, column) in encrypted_values(statement, self.rule) {
            if let ValueExpr::Literal {
                value,
                start_index,
                stop_index,
            } = value
            {
                let encrypted = column.encrypt(value)?;
                tokens.push(SqlToken::new(
                    *start_index,
                    *stop_index,
                    TokenKind::Literal {
                        text: encrypted.to_sql_literal(),
                    },
                ));
            }
        }
        Ok(tokens)
    }
}

struct EncryptParameterRewriter<'a> {
    rule: &'a EncryptRule,
}

impl ParameterRewriter for EncryptParameterRewriter<'_> {
    fn is_need_rewrite(
        &self,
        _statement: &StatementContext,
        _route_context: &RouteContext,
    ) -> bool {
        true
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, context: &GenerateContext<'_>) -> Result<()> {
        for (value, column) in encrypted_values(context.statement, self.rule) {
            if let Some(index) = value.parameter_index() {
                let plain = value.resolve(context.parameters)?;
                builder.replace(index, column.encrypt(&plain)?);
            }
        }
        Ok(())
    }
}

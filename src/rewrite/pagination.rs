//! Pagination window revision for multi-unit SELECTs.
//!
//! Each unit must return rows `[0, offset + row_count)` so the merged result
//! can still apply the original window. Parameter-bound values are replaced
//! in place; literal values get a token.

use tracing::debug;

use crate::error::Result;
use crate::route::RouteContext;
use crate::statement::{PaginationContext, PaginationValue, StatementContext};
use crate::value::Value;

use super::context::{GenerateContext, ParameterRewriter, SqlTokenGenerator};
use super::parameter::ParameterBuilder;
use super::token::{SqlToken, TokenKind};

pub fn is_need_rewrite(statement: &StatementContext, route_context: &RouteContext) -> bool {
    statement.is_select() && statement.has_pagination() && !route_context.is_single_routing()
}

/// Revised `(offset, row_count)`: offset becomes zero, row count becomes
/// offset plus row count.
pub fn revised_window(
    pagination: &PaginationContext,
    parameters: &[Value],
) -> Result<(i64, Option<i64>)> {
    let offset = pagination.actual_offset(parameters)?;
    let row_count = pagination.actual_row_count(parameters)?;
    Ok((0, row_count.map(|count| offset.saturating_add(count))))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationParameterRewriter;

impl ParameterRewriter for PaginationParameterRewriter {
    fn is_need_rewrite(&self, statement: &StatementContext, route_context: &RouteContext) -> bool {
        is_need_rewrite(statement, route_context)
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, context: &GenerateContext<'_>) -> Result<()> {
        let pagination = match &context.statement.pagination {
            Some(pagination) => pagination,
            None => return Ok(()),
        };
        let (offset, row_count) = revised_window(pagination, context.parameters)?;
        if let Some(index) = pagination.offset.as_ref().and_then(PaginationValue::parameter_index) {
            builder.replace(index, Value::Int(offset));
        }
        if let (Some(index), Some(row_count)) = (
            pagination.row_count.as_ref().and_then(PaginationValue::parameter_index),
            row_count,
        ) {
            builder.replace(index, Value::Int(row_count));
        }
        debug!(offset, row_count = ?row_count, "pagination parameters revised");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationTokenGenerator;

impl SqlTokenGenerator for PaginationTokenGenerator {
    fn name(&self) -> &'static str {
        "pagination"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        if !is_need_rewrite(context.statement, context.route_context) {
            return Ok(Vec::new());
        }
        let pagination = match &context.statement.pagination {
            Some(pagination) => pagination,
            None => return Ok(Vec::new()),
        };
        let (offset, row_count) = revised_window(pagination, context.parameters)?;
        let mut tokens = Vec::with_capacity(2);
        if let Some(PaginationValue::Literal {
            start_index,
            stop_index,
            ..
        }) = &pagination.offset
        {
            let kind = TokenKind::Pagination { value: offset };
            tokens.push(SqlToken::new(*start_index, *stop_index, kind));
        }
        if let (
            Some(PaginationValue::Literal {
                start_index,
                stop_index,
                ..
            }),
            Some(row_count),
        ) = (&pagination.row_count, row_count)
        {
            let kind = TokenKind::Pagination { value: row_count };
            tokens.push(SqlToken::new(*start_index, *stop_index, kind));
        }
        Ok(tokens)
    }
}

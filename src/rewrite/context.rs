//! Per-statement rewrite state filled in by the decorators.

use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::route::RouteContext;
use crate::statement::StatementContext;
use crate::value::Value;

use super::parameter::ParameterBuilder;
use super::token::{SqlToken, TokenKind};

/// What generators and parameter rewriters see.
#[derive(Debug, Clone, Copy)]
pub struct GenerateContext<'c> {
    pub sql: &'c str,
    pub statement: &'c StatementContext,
    pub parameters: &'c [Value],
    pub route_context: &'c RouteContext,
}

pub trait SqlTokenGenerator {
    fn name(&self) -> &'static str;

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>>;
}

pub trait ParameterRewriter {
    fn is_need_rewrite(&self, statement: &StatementContext, route_context: &RouteContext) -> bool;

    fn rewrite(&self, builder: &mut ParameterBuilder, context: &GenerateContext<'_>) -> Result<()>;
}

pub struct SqlRewriteContext<'a> {
    sql: &'a str,
    statement: &'a StatementContext,
    parameters: &'a [Value],
    parameter_builder: ParameterBuilder,
    generators: Vec<Box<dyn SqlTokenGenerator + 'a>>,
    rewriters: Vec<Box<dyn ParameterRewriter + 'a>>,
    tokens: Vec<SqlToken>,
}

impl<'a> SqlRewriteContext<'a> {
    pub fn new(sql: &'a str, statement: &'a StatementContext, parameters: &'a [Value]) -> Self {
        Self {
            sql,
            statement,
            parameters,
            parameter_builder: ParameterBuilder::new(parameters),
            generators: Vec::new(),
            rewriters: Vec::new(),
            tokens: Vec::new(),
        }
    }

    pub fn sql(&self) -> &'a str {
        self.sql
    }

    pub fn statement(&self) -> &'a StatementContext {
        self.statement
    }

    pub fn parameters(&self) -> &'a [Value] {
        self.parameters
    }

    pub fn add_generator(&mut self, generator: impl SqlTokenGenerator + 'a) {
        self.generators.push(Box::new(generator));
    }

    /// Ignored when the statement has no parameters.
    pub fn add_parameter_rewriter(&mut self, rewriter: impl ParameterRewriter + 'a) {
        if !self.parameters.is_empty() {
            self.rewriters.push(Box::new(rewriter));
        }
    }

    pub fn parameter_builder(&self) -> &ParameterBuilder {
        &self.parameter_builder
    }

    pub fn tokens(&self) -> &[SqlToken] {
        &self.tokens
    }

    /// Runs parameter rewriters, then token generators, and leaves the tokens
    /// sorted, bounded and non-overlapping.
    pub fn generate(&mut self, route_context: &RouteContext) -> Result<()> {
        let context = GenerateContext {
            sql: self.sql,
            statement: self.statement,
            parameters: self.parameters,
            route_context,
        };
        for rewriter in &self.rewriters {
            if rewriter.is_need_rewrite(self.statement, route_context) {
                rewriter.rewrite(&mut self.parameter_builder, &context)?;
            }
        }
        let mut tokens = Vec::new();
        for generator in &self.generators {
            let generated = generator.generate(&context)?;
            trace!(generator = generator.name(), count = generated.len(), "tokens generated");
            tokens.extend(generated);
        }
        self.tokens = finalize(self.sql, tokens)?;
        Ok(())
    }
}

fn check_bounds(token: &SqlToken, sql: &str) -> Result<()> {
    let len = sql.len();
    let ranges =
        std::iter::once((token.start_index, token.stop_index)).chain(token.nested_ranges());
    for (start, stop) in ranges {
        if start > stop
            || stop >= len
            || !sql.is_char_boundary(start)
            || !sql.is_char_boundary(stop + 1)
        {
            error!(start, stop, len, "token out of bounds");
            return Err(Error::TokenOutOfBounds { start, stop, len });
        }
    }
    Ok(())
}

/// Folds tokens nested in an IN item or INSERT row into that item's text,
/// then sorts the rest and rejects overlaps.
pub(crate) fn finalize(sql: &str, tokens: Vec<SqlToken>) -> Result<Vec<SqlToken>> {
    for token in &tokens {
        check_bounds(token, sql)?;
    }
    let (mut containers, others): (Vec<SqlToken>, Vec<SqlToken>) =
        tokens.into_iter().partition(|t| !t.nested_ranges().is_empty());

    let mut result = Vec::with_capacity(containers.len() + others.len());
    let mut inner: Vec<Vec<SqlToken>> = vec![Vec::new(); containers.len()];
    for token in others {
        let owner = containers.iter().position(|c| {
            c.nested_ranges()
                .iter()
                .any(|(start, stop)| token.start_index >= *start && token.stop_index <= *stop)
        });
        match owner {
            Some(i) => inner[i].push(token),
            None => result.push(token),
        }
    }

    for (container, nested) in containers.iter_mut().zip(inner) {
        let items = match &mut container.kind {
            TokenKind::InPredicate { items } | TokenKind::InsertValues { rows: items } => items,
            _ => continue,
        };
        for item in items.iter_mut() {
            let mut nested_in_item: Vec<SqlToken> = nested
                .iter()
                .filter(|t| t.start_index >= item.start_index && t.stop_index <= item.stop_index)
                .cloned()
                .collect();
            nested_in_item.sort_by_key(|t| t.start_index);
            check_overlap(&nested_in_item)?;
            item.text = render(sql, item.start_index, item.stop_index, &nested_in_item);
        }
    }
    result.extend(containers);
    result.sort_by_key(|t| t.start_index);
    check_overlap(&result)?;
    Ok(result)
}

fn check_overlap(tokens: &[SqlToken]) -> Result<()> {
    for pair in tokens.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if second.start_index <= first.stop_index {
            error!(
                first_start = first.start_index,
                first_stop = first.stop_index,
                second_start = second.start_index,
                second_stop = second.stop_index,
                "overlapping rewrite tokens"
            );
            return Err(Error::TokenOverlap {
                first_start: first.start_index,
                first_stop: first.stop_index,
                second_start: second.start_index,
                second_stop: second.stop_index,
            });
        }
    }
    Ok(())
}

/// Text of `sql[start..=stop]` with unit-independent tokens applied.
fn render(sql: &str, start: usize, stop: usize, tokens: &[SqlToken]) -> String {
    let mut text = String::with_capacity(stop + 1 - start);
    let mut cursor = start;
    for token in tokens {
        text.push_str(&sql[cursor..token.start_index]);
        text.push_str(&token.to_text(None));
        cursor = token.stop_index + 1;
    }
    text.push_str(&sql[cursor..=stop]);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datanode::DataNode;
    use crate::rewrite::token::{FilteredItem, UnitFilter};

    #[test]
    fn test_overlap_rejected() {
        let sql = "SELECT * FROM t_order";
        let tokens = vec![
            SqlToken::new(14, 20, TokenKind::Remove),
            SqlToken::new(10, 15, TokenKind::Remove),
        ];
        assert!(matches!(finalize(sql, tokens), Err(Error::TokenOverlap { .. })));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let sql = "SELECT 1";
        let tokens = vec![SqlToken::new(7, 8, TokenKind::Remove)];
        assert_eq!(
            finalize(sql, tokens),
            Err(Error::TokenOutOfBounds { start: 7, stop: 8, len: 8 })
        );
    }

    #[test]
    fn test_nested_literal_folds_into_row() {
        let sql = "INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y')";
        let filter = UnitFilter::new("t", vec![DataNode::new("ds", "t_0")]);
        let rows = vec![
            FilteredItem::new(28, 35, filter.clone()),
            FilteredItem::new(38, 45, filter),
        ];
        let tokens = vec![
            SqlToken::new(42, 44, TokenKind::Literal { text: "'z'".to_string() }),
            SqlToken::new(28, 45, TokenKind::InsertValues { rows }),
        ];
        let tokens = finalize(sql, tokens).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].to_text(None), "(1, 'x'), (2, 'z')");
    }
}

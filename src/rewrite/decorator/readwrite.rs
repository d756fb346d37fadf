use crate::error::Result;
use crate::route::RouteContext;
use crate::rule::RuleSet;
use crate::statement::{CommentSegment, StatementContext};

use super::RewriteDecorator;
use crate::rewrite::context::{GenerateContext, SqlRewriteContext, SqlTokenGenerator};
use crate::rewrite::token::{SqlToken, TokenKind};

/// Strips write-route hint comments. A comment that is also a shadow hint is
/// left to the shadow decorator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadwriteDecorator;

fn write_hints<'s>(statement: &'s StatementContext, rules: &RuleSet) -> Vec<&'s CommentSegment> {
    let readwrite = match rules.readwrite() {
        Some(rule) => rule,
        None => return Vec::new(),
    };
    let shadow_hints = rules
        .shadow()
        .map(|rule| rule.hint_comments(statement))
        .unwrap_or_default();
    readwrite
        .hint_comments(statement)
        .into_iter()
        .filter(|c| !shadow_hints.iter().any(|s| s.start_index == c.start_index))
        .collect()
}

impl RewriteDecorator for ReadwriteDecorator {
    fn name(&self) -> &'static str {
        "readwrite_splitting"
    }

    fn is_applicable(&self, statement: &StatementContext, rules: &RuleSet) -> bool {
        !write_hints(statement, rules).is_empty()
    }

    fn decorate<'a>(
        &self,
        rules: &'a RuleSet,
        context: &mut SqlRewriteContext<'a>,
        _route_context: &RouteContext,
    ) -> Result<()> {
        context.add_generator(WriteHintRemover { rules });
        Ok(())
    }
}

struct WriteHintRemover<'a> {
    rules: &'a RuleSet,
}

impl SqlTokenGenerator for WriteHintRemover<'_> {
    fn name(&self) -> &'static str {
        "write_route_hint"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        Ok(write_hints(context.statement, self.rules)
            .into_iter()
            .map(|c| SqlToken::new(c.start_index, c.stop_index, TokenKind::Remove))
            .collect())
    }
}

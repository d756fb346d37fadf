use crate::error::Result;
use crate::features::ShadowRule;
use crate::route::RouteContext;
use crate::rule::RuleSet;
use crate::statement::StatementContext;

use super::RewriteDecorator;
use crate::rewrite::context::{GenerateContext, SqlRewriteContext, SqlTokenGenerator};
use crate::rewrite::token::{SqlToken, TokenKind};

/// Strips shadow hint comments before the SQL reaches a data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowDecorator;

impl RewriteDecorator for ShadowDecorator {
    fn name(&self) -> &'static str {
        "shadow"
    }

    fn is_applicable(&self, statement: &StatementContext, rules: &RuleSet) -> bool {
        rules
            .shadow()
            .map_or(false, |rule| !rule.hint_comments(statement).is_empty())
    }

    fn decorate<'a>(
        &self,
        rules: &'a RuleSet,
        context: &mut SqlRewriteContext<'a>,
        _route_context: &RouteContext,
    ) -> Result<()> {
        if let Some(rule) = rules.shadow() {
            context.add_generator(ShadowHintRemover { rule });
        }
        Ok(())
    }
}

struct ShadowHintRemover<'a> {
    rule: &'a ShadowRule,
}

impl SqlTokenGenerator for ShadowHintRemover<'_> {
    fn name(&self) -> &'static str {
        "shadow_hint"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        Ok(self
            .rule
            .hint_comments(context.statement)
            .into_iter()
            .map(|c| SqlToken::new(c.start_index, c.stop_index, TokenKind::Remove))
            .collect())
    }
}

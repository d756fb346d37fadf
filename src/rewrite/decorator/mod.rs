//! Feature decorators. Each one inspects the statement and registers the
//! token generators and parameter rewriters its feature needs.

pub mod encrypt;
pub mod readwrite;
pub mod shadow;
pub mod sharding;

pub use encrypt::EncryptDecorator;
pub use readwrite::ReadwriteDecorator;
pub use shadow::ShadowDecorator;
pub use sharding::ShardingDecorator;

use crate::error::Result;
use crate::route::RouteContext;
use crate::rule::RuleSet;
use crate::statement::StatementContext;

use super::context::SqlRewriteContext;

pub trait RewriteDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    /// False leaves the rewrite context untouched.
    fn is_applicable(&self, statement: &StatementContext, rules: &RuleSet) -> bool;

    fn decorate<'a>(
        &self,
        rules: &'a RuleSet,
        context: &mut SqlRewriteContext<'a>,
        route_context: &RouteContext,
    ) -> Result<()>;
}

/// Decorators in application order.
pub fn decorators() -> [&'static dyn RewriteDecorator; 4] {
    [&ShardingDecorator, &EncryptDecorator, &ShadowDecorator, &ReadwriteDecorator]
}

use tracing::debug;

use crate::error::Result;
use crate::features::ReadwriteSplittingRule;
use crate::statement::StatementContext;

use super::{RouteContext, RouteMapper};

/// Replaces read/write group names with the primary or a replica. The
/// replica is chosen once per statement so every unit of a group agrees.
pub fn route(
    context: RouteContext,
    statement: &StatementContext,
    rule: &ReadwriteSplittingRule,
) -> Result<RouteContext> {
    let primary = rule.is_primary_route(statement);
    let category = context.category().clone();
    let mut chosen: Vec<(String, String)> = Vec::new();
    context.map_data_sources(category, |mapper| {
        let previous = chosen
            .iter()
            .find(|(group, _)| group.eq_ignore_ascii_case(&mapper.actual_name));
        if let Some((_, actual)) = previous {
            return Ok(RouteMapper::new(mapper.logic_name.clone(), actual.clone()));
        }
        Ok(match rule.route(&mapper.actual_name, primary) {
            Some(actual) => {
                debug!(
                    group = %mapper.actual_name,
                    actual,
                    primary,
                    "read/write data source chosen"
                );
                chosen.push((mapper.actual_name.clone(), actual.to_string()));
                RouteMapper::new(mapper.logic_name.clone(), actual)
            }
            None => mapper.clone(),
        })
    })
}

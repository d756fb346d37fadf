use tracing::debug;

use crate::error::Result;
use crate::features::ShadowRule;

use super::{RouteCategory, RouteContext, RouteMapper};

/// Redirects every unit whose data source has a shadow counterpart. Units
/// without a mapping keep their production data source.
pub fn route(context: RouteContext, rule: &ShadowRule) -> Result<RouteContext> {
    context.map_data_sources(RouteCategory::Shadow, |mapper| {
        Ok(match rule.shadow_data_source(&mapper.actual_name) {
            Some(shadow) => {
                debug!(production = %mapper.actual_name, shadow, "shadow data source substituted");
                RouteMapper::new(mapper.logic_name.clone(), shadow)
            }
            None => mapper.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShadowDataSourceConfiguration, ShadowRuleConfiguration};
    use crate::route::{RouteContextBuilder, RouteUnit};

    #[test]
    fn test_only_mapped_sources_move() {
        let rule = ShadowRule::build(&ShadowRuleConfiguration {
            data_sources: vec![ShadowDataSourceConfiguration {
                production_data_source: "ds_0".to_string(),
                shadow_data_source: "ds_0_shadow".to_string(),
            }],
            ..Default::default()
        });
        let mut builder = RouteContextBuilder::new();
        builder.push(RouteUnit::new(RouteMapper::identity("ds_0"), [RouteMapper::identity("t")]));
        builder.push(RouteUnit::new(RouteMapper::identity("ds_1"), [RouteMapper::identity("t")]));
        let source = builder.build(RouteCategory::SingleTable, &[]).unwrap();
        let context = route(source, &rule).unwrap();
        assert_eq!(context.category(), &RouteCategory::Shadow);
        assert_eq!(context.units()[0].data_source(), "ds_0_shadow");
        assert_eq!(context.units()[0].logic_data_source(), "ds_0");
        assert_eq!(context.units()[1].data_source(), "ds_1");
    }
}

use tracing::debug;

use crate::error::Result;
use crate::route::standard::route_data_nodes;
use crate::route::RouteContext;
use crate::rule::RuleSet;
use crate::sharding::condition::{extract, sharding_tables_for};
use crate::sharding::{ShardingConditionValue, ShardingRule};
use crate::statement::{PredicateOperator, StatementContext, StatementKind, ValueExpr};
use crate::value::Value;

use super::RewriteDecorator;
use crate::rewrite::context::{
    GenerateContext, ParameterRewriter, SqlRewriteContext, SqlTokenGenerator,
};
use crate::rewrite::pagination::{PaginationParameterRewriter, PaginationTokenGenerator};
use crate::rewrite::parameter::ParameterBuilder;
use crate::rewrite::token::{FilteredItem, SqlToken, TokenKind, UnitFilter};

#[derive(Debug, Clone, Copy, Default)]
pub struct ShardingDecorator;

impl RewriteDecorator for ShardingDecorator {
    fn name(&self) -> &'static str {
        "sharding"
    }

    fn is_applicable(&self, statement: &StatementContext, rules: &RuleSet) -> bool {
        match rules.sharding() {
            Some(sharding) => {
                statement.kind.is_index_alteration()
                    || statement.tables.iter().any(|t| sharding.governs(&t.name))
            }
            None => false,
        }
    }

    fn decorate<'a>(
        &self,
        rules: &'a RuleSet,
        context: &mut SqlRewriteContext<'a>,
        _route_context: &RouteContext,
    ) -> Result<()> {
        let sharding = match rules.sharding() {
            Some(sharding) => sharding,
            None => return Ok(()),
        };
        context.add_generator(TableTokenGenerator { sharding });
        context.add_generator(IndexTokenGenerator { sharding });
        context.add_generator(InPredicateTokenGenerator { sharding });
        context.add_generator(InsertValuesTokenGenerator { sharding });
        context.add_generator(PaginationTokenGenerator);
        context.add_parameter_rewriter(PaginationParameterRewriter);
        context.add_parameter_rewriter(GroupedParameterRewriter { sharding });
        Ok(())
    }
}

struct TableTokenGenerator<'a> {
    sharding: &'a ShardingRule,
}

impl SqlTokenGenerator for TableTokenGenerator<'_> {
    fn name(&self) -> &'static str {
        "table"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        Ok(context
            .statement
            .tables
            .iter()
            .filter(|t| self.sharding.is_sharding_table(&t.name))
            .map(|t| {
                SqlToken::new(
                    t.start_index,
                    t.stop_index,
                    TokenKind::Table {
                        logic_table: t.name.clone(),
                        quote: t.quote,
                    },
                )
            })
            .collect())
    }
}

struct IndexTokenGenerator<'a> {
    sharding: &'a ShardingRule,
}

impl SqlTokenGenerator for IndexTokenGenerator<'_> {
    fn name(&self) -> &'static str {
        "index"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        let statement = context.statement;
        if !matches!(
            statement.kind,
            StatementKind::CreateIndex | StatementKind::AlterIndex | StatementKind::DropIndex
        ) {
            return Ok(Vec::new());
        }
        let logic_table = match statement
            .tables
            .iter()
            .find(|t| self.sharding.is_sharding_table(&t.name))
        {
            Some(table) => table.name.clone(),
            None => return Ok(Vec::new()),
        };
        Ok(statement
            .indexes
            .iter()
            .map(|index| {
                SqlToken::new(
                    index.start_index,
                    index.stop_index,
                    TokenKind::Index {
                        name: index.name.clone(),
                        logic_table: logic_table.clone(),
                        quote: index.quote,
                    },
                )
            })
            .collect())
    }
}

/// Items of one IN predicate on a sharding column with the nodes each routes to.
struct InItems<'s> {
    start_index: usize,
    stop_index: usize,
    items: Vec<(&'s ValueExpr, UnitFilter)>,
}

fn in_predicates<'s>(
    statement: &'s StatementContext,
    parameters: &[Value],
    sharding: &ShardingRule,
) -> Result<Vec<InItems<'s>>> {
    let mut result = Vec::new();
    for predicate in &statement.predicates {
        let values = match &predicate.operator {
            PredicateOperator::In(values) if values.len() > 1 => values,
            _ => continue,
        };
        let tables = sharding_tables_for(statement, &predicate.column, sharding);
        let table = match tables.into_iter().next() {
            Some(table) => table,
            None => continue,
        };
        let table_rule = match sharding.table_rule(&table) {
            Some(rule) => rule,
            None => continue,
        };
        let mut items = Vec::with_capacity(values.len());
        for value in values {
            let condition = [ShardingConditionValue::list(
                table.clone(),
                predicate.column.name.clone(),
                vec![value.resolve(parameters)?],
            )];
            let nodes = route_data_nodes(sharding, table_rule, &condition)?;
            items.push((value, UnitFilter::new(table.clone(), nodes)));
        }
        if let (Some(first), Some(last)) = (values.first(), values.last()) {
            result.push(InItems {
                start_index: first.start_index(),
                stop_index: last.stop_index(),
                items,
            });
        }
    }
    Ok(result)
}

/// Rows of a multi-row INSERT with the node each routes to.
fn insert_rows(
    statement: &StatementContext,
    parameters: &[Value],
    sharding: &ShardingRule,
) -> Result<Vec<(usize, UnitFilter)>> {
    let insert = match &statement.insert {
        Some(insert) if statement.kind == StatementKind::Insert && insert.rows.len() > 1 => insert,
        _ => return Ok(Vec::new()),
    };
    let table_rule = match statement.tables.first().and_then(|t| sharding.table_rule(&t.name)) {
        Some(rule) => rule,
        None => return Ok(Vec::new()),
    };
    let conditions = extract(statement, parameters, sharding)?;
    let mut rows = Vec::with_capacity(insert.rows.len());
    for condition in &conditions.conditions {
        if let Some(row) = condition.row {
            let nodes = route_data_nodes(sharding, table_rule, &condition.values)?;
            rows.push((row, UnitFilter::new(table_rule.logic_table.clone(), nodes)));
        }
    }
    Ok(rows)
}

struct InPredicateTokenGenerator<'a> {
    sharding: &'a ShardingRule,
}

impl SqlTokenGenerator for InPredicateTokenGenerator<'_> {
    fn name(&self) -> &'static str {
        "in_predicate"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        if context.route_context.is_single_routing() {
            return Ok(Vec::new());
        }
        let predicates = in_predicates(context.statement, context.parameters, self.sharding)?;
        Ok(predicates
            .into_iter()
            .map(|p| {
                let items = p
                    .items
                    .into_iter()
                    .map(|(value, filter)| {
                        FilteredItem::new(value.start_index(), value.stop_index(), filter)
                    })
                    .collect();
                SqlToken::new(p.start_index, p.stop_index, TokenKind::InPredicate { items })
            })
            .collect())
    }
}

struct InsertValuesTokenGenerator<'a> {
    sharding: &'a ShardingRule,
}

impl SqlTokenGenerator for InsertValuesTokenGenerator<'_> {
    fn name(&self) -> &'static str {
        "insert_values"
    }

    fn generate(&self, context: &GenerateContext<'_>) -> Result<Vec<SqlToken>> {
        if context.route_context.is_single_routing() {
            return Ok(Vec::new());
        }
        let insert = match &context.statement.insert {
            Some(insert) => insert,
            None => return Ok(Vec::new()),
        };
        let rows = insert_rows(context.statement, context.parameters, self.sharding)?;
        let items: Vec<FilteredItem> = rows
            .into_iter()
            .filter_map(|(row, filter)| {
                insert
                    .rows
                    .get(row)
                    .map(|r| FilteredItem::new(r.start_index, r.stop_index, filter))
            })
            .collect();
        match (insert.rows.first(), insert.rows.last()) {
            (Some(first), Some(last)) if !items.is_empty() => Ok(vec![SqlToken::new(
                first.start_index,
                last.stop_index,
                TokenKind::InsertValues { rows: items },
            )]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Drops IN-item and INSERT-row parameters from units their item does not reach.
struct GroupedParameterRewriter<'a> {
    sharding: &'a ShardingRule,
}

impl ParameterRewriter for GroupedParameterRewriter<'_> {
    fn is_need_rewrite(&self, _statement: &StatementContext, route_context: &RouteContext) -> bool {
        !route_context.is_single_routing()
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, context: &GenerateContext<'_>) -> Result<()> {
        for predicate in in_predicates(context.statement, context.parameters, self.sharding)? {
            builder.add_filtered_group(
                predicate
                    .items
                    .into_iter()
                    .map(|(value, filter)| (value.parameter_index().into_iter().collect(), filter))
                    .collect(),
            );
        }
        if let Some(insert) = &context.statement.insert {
            let rows = insert_rows(context.statement, context.parameters, self.sharding)?;
            if !rows.is_empty() {
                debug!(rows = rows.len(), "insert parameters grouped by row");
            }
            builder.add_filtered_group(
                rows.into_iter()
                    .filter_map(|(row, filter)| {
                        insert.rows.get(row).map(|r| {
                            let indices =
                                r.values.iter().filter_map(ValueExpr::parameter_index).collect();
                            (indices, filter)
                        })
                    })
                    .collect(),
            );
        }
        Ok(())
    }
}

//! End-to-end pipeline: route a bound statement, rewrite it per route unit and
//! hand back the ordered execution list.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::MetricsRecorder;
use crate::rewrite::{SqlRewriteEngine, SqlRewriteResult};
use crate::route::{RouteContext, Router};
use crate::rule::RuleSet;
use crate::statement::StatementContext;
use crate::value::Value;

/// One logical statement as received from the client.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub sql: String,
    pub statement: StatementContext,
    pub parameters: Vec<Value>,
}

impl QueryContext {
    pub fn new(
        sql: impl Into<String>,
        statement: StatementContext,
        parameters: Vec<Value>,
    ) -> Self {
        Self {
            sql: sql.into(),
            statement,
            parameters,
        }
    }
}

/// SQL and parameters bound for one actual data source.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUnit {
    pub data_source: String,
    pub sql: String,
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    route_context: RouteContext,
    units: Vec<ExecutionUnit>,
}

impl ExecutionContext {
    pub fn route_context(&self) -> &RouteContext {
        &self.route_context
    }

    /// In route unit order.
    pub fn units(&self) -> &[ExecutionUnit] {
        &self.units
    }
}

#[derive(Debug, Clone)]
pub struct Kernel {
    rules: Arc<RuleSet>,
    metrics: MetricsRecorder,
}

impl Kernel {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        let metrics = MetricsRecorder::new(rules.props().metrics_enabled);
        Self { rules, metrics }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn generate_execution_context(&self, query: &QueryContext) -> Result<ExecutionContext> {
        let guard = self.metrics.record_route();
        let result = self.execute(query);
        match &result {
            Ok((context, identity)) => {
                self.metrics.record_units(context.units.len());
                self.metrics.record_rewrite(*identity);
                guard.complete(context.route_context.category().label(), true);
            }
            Err(_) => guard.complete("failed", false),
        }
        result.map(|(context, _)| context)
    }

    fn execute(&self, query: &QueryContext) -> Result<(ExecutionContext, bool)> {
        let route_context = Router::new(&self.rules).route(&query.statement, &query.parameters)?;
        let rewrite = SqlRewriteEngine::new(&self.rules).rewrite(
            &query.sql,
            &query.statement,
            &query.parameters,
            &route_context,
        )?;
        let identity = rewrite.is_identity();
        let units: Vec<ExecutionUnit> = match rewrite {
            SqlRewriteResult::Identity(unit) => route_context
                .units()
                .iter()
                .map(|route_unit| ExecutionUnit {
                    data_source: route_unit.data_source().to_string(),
                    sql: unit.sql.clone(),
                    parameters: unit.parameters.clone(),
                })
                .collect(),
            SqlRewriteResult::RouteUnits(units) => units
                .into_iter()
                .map(|(route_unit, unit)| ExecutionUnit {
                    data_source: route_unit.data_source().to_string(),
                    sql: unit.sql,
                    parameters: unit.parameters,
                })
                .collect(),
        };

        if self.rules.props().sql_show {
            info!(sql = %query.sql, "Logic SQL");
            for unit in &units {
                info!(
                    data_source = %unit.data_source,
                    sql = %unit.sql,
                    parameters = ?unit.parameters,
                    "Actual SQL"
                );
            }
        }
        debug!(
            category = route_context.category().label(),
            units = units.len(),
            "execution context generated"
        );

        Ok((ExecutionContext { route_context, units }, identity))
    }
}

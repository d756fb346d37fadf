//! Statement classification and route dispatch.
//!
//! Every statement resolves to exactly one [`RouteCategory`] through
//! [`classify`], and each category has one handler. Shadow and read/write
//! splitting are applied afterwards as data source substitutions.

use tracing::debug;

use crate::error::{Error, Result};
use crate::names::NameSet;
use crate::rule::RuleSet;
use crate::statement::{StatementContext, StatementKind};
use crate::value::Value;

use super::{broadcast, readwrite, shadow, single, standard, RouteContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Every logical data source.
    Database,
    /// Every actual data node of the referenced sharding tables.
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteCategory {
    StandardSharding,
    Broadcast(BroadcastScope),
    SingleTable,
    /// One arbitrary target: table-less queries, metadata queries, reads of
    /// broadcast tables.
    Unicast,
    /// A routed statement redirected to shadow data sources.
    Shadow,
    /// Table scopes that no single route can satisfy.
    Unsupported(String),
}

impl RouteCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RouteCategory::StandardSharding => "standard",
            RouteCategory::Broadcast(BroadcastScope::Database) => "database_broadcast",
            RouteCategory::Broadcast(BroadcastScope::Table) => "table_broadcast",
            RouteCategory::SingleTable => "single",
            RouteCategory::Unicast => "unicast",
            RouteCategory::Shadow => "shadow",
            RouteCategory::Unsupported(_) => "unsupported",
        }
    }
}

/// Total classification of one statement. Shadow detection comes first; the
/// other categories depend only on the statement kind and its tables.
pub fn classify(
    statement: &StatementContext,
    parameters: &[Value],
    rules: &RuleSet,
) -> Result<RouteCategory> {
    if let Some(rule) = rules.shadow() {
        if rule.is_shadow(statement, parameters)? {
            return Ok(RouteCategory::Shadow);
        }
    }
    Ok(classify_tables(statement, rules))
}

/// Classification ignoring shadow markers; never returns `Shadow`.
pub fn classify_tables(statement: &StatementContext, rules: &RuleSet) -> RouteCategory {
    let tables = statement.table_names();
    let mut sharding = NameSet::new();
    let mut broadcast = NameSet::new();
    let mut others = NameSet::new();
    for table in tables.iter() {
        if rules.is_sharding_table(table) {
            sharding.insert(table);
        } else if rules.is_broadcast_table(table) {
            broadcast.insert(table);
        } else {
            others.insert(table);
        }
    }

    if !sharding.is_empty() && !others.is_empty() {
        return RouteCategory::Unsupported(format!(
            "sharding tables {:?} cannot be combined with single tables {:?}",
            sharding.to_vec(),
            others.to_vec()
        ));
    }

    let kind = statement.kind;
    if tables.is_empty() {
        return match kind {
            StatementKind::Set
            | StatementKind::Transaction
            | StatementKind::AccessControl
            | StatementKind::Maintenance => RouteCategory::Broadcast(BroadcastScope::Database),
            kind if kind.is_ddl() => RouteCategory::Broadcast(BroadcastScope::Database),
            _ => RouteCategory::Unicast,
        };
    }

    if statement.has_cursor || kind.is_ddl() || kind == StatementKind::Maintenance {
        if !sharding.is_empty() {
            return RouteCategory::Broadcast(BroadcastScope::Table);
        }
        return match (broadcast.is_empty(), others.is_empty()) {
            (false, true) => RouteCategory::Broadcast(BroadcastScope::Database),
            (true, false) => RouteCategory::SingleTable,
            _ => RouteCategory::Unsupported(format!(
                "statement spans broadcast tables {:?} and single tables {:?}",
                broadcast.to_vec(),
                others.to_vec()
            )),
        };
    }

    match kind {
        StatementKind::Set | StatementKind::Transaction | StatementKind::AccessControl => {
            RouteCategory::Broadcast(BroadcastScope::Database)
        }
        StatementKind::Show => {
            if others.is_empty() {
                RouteCategory::Unicast
            } else {
                RouteCategory::SingleTable
            }
        }
        _ if !sharding.is_empty() => RouteCategory::StandardSharding,
        _ if others.is_empty() => {
            if kind.is_write() {
                RouteCategory::Broadcast(BroadcastScope::Database)
            } else {
                RouteCategory::Unicast
            }
        }
        _ if broadcast.is_empty() || !kind.is_write() => RouteCategory::SingleTable,
        _ => RouteCategory::Unsupported(format!(
            "write spans broadcast tables {:?} and single tables {:?}",
            broadcast.to_vec(),
            others.to_vec()
        )),
    }
}

/// Routes statements against one rule set.
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    rules: &'a RuleSet,
}

impl<'a> Router<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    pub fn route(
        &self,
        statement: &StatementContext,
        parameters: &[Value],
    ) -> Result<RouteContext> {
        let category = classify(statement, parameters, self.rules)?;
        debug!(category = category.label(), kind = ?statement.kind, "statement classified");

        let mut context = self.route_category(&category, statement, parameters)?;
        if let Some(rule) = self.rules.readwrite() {
            context = readwrite::route(context, statement, rule)?;
        }
        debug!(
            category = context.category().label(),
            units = context.units().len(),
            "statement routed"
        );
        Ok(context)
    }

    fn route_category(
        &self,
        category: &RouteCategory,
        statement: &StatementContext,
        parameters: &[Value],
    ) -> Result<RouteContext> {
        match category {
            RouteCategory::StandardSharding => standard::route(statement, parameters, self.rules),
            RouteCategory::Broadcast(scope) => broadcast::route(statement, self.rules, *scope),
            RouteCategory::SingleTable => single::route(statement, self.rules),
            RouteCategory::Unicast => single::route_unicast(statement, self.rules),
            RouteCategory::Unsupported(reason) => Err(Error::UnsupportedStatement {
                reason: reason.clone(),
            }),
            RouteCategory::Shadow => {
                let base = classify_tables(statement, self.rules);
                let context = self.route_category(&base, statement, parameters)?;
                match self.rules.shadow() {
                    Some(rule) => shadow::route(context, rule),
                    None => Ok(context),
                }
            }
        }
    }
}

//! Replacement tokens over the original SQL text.

use crate::datanode::DataNode;
use crate::names::eq_ignore_case;
use crate::route::RouteUnit;

/// Which units a piece of SQL (an IN item, an INSERT row, a parameter) belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFilter {
    pub logic_table: String,
    pub nodes: Vec<DataNode>,
}

impl UnitFilter {
    pub fn new(logic_table: impl Into<String>, nodes: Vec<DataNode>) -> Self {
        Self {
            logic_table: logic_table.into(),
            nodes,
        }
    }

    /// Matches on the unit's logical data source so shadow and replica
    /// substitution do not hide a routed node.
    pub fn accepts(&self, unit: &RouteUnit) -> bool {
        let table = match unit.actual_table(&self.logic_table) {
            Some(table) => table,
            None => return true,
        };
        self.nodes
            .iter()
            .any(|node| node.matches(unit.logic_data_source(), table))
    }
}

/// An IN item or an INSERT row with its rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredItem {
    pub start_index: usize,
    pub stop_index: usize,
    /// Filled from the original SQL when tokens are finalized.
    pub text: String,
    pub filter: UnitFilter,
}

impl FilteredItem {
    pub fn new(start_index: usize, stop_index: usize, filter: UnitFilter) -> Self {
        Self {
            start_index,
            stop_index,
            text: String::new(),
            filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Logic table name replaced by the unit's actual table.
    Table { logic_table: String, quote: Option<char> },
    /// Index name suffixed with the unit's actual table.
    Index {
        name: String,
        logic_table: String,
        quote: Option<char>,
    },
    /// Items of an IN list; each unit keeps the items routed to it.
    InPredicate { items: Vec<FilteredItem> },
    /// Rows of a multi-row INSERT; each unit keeps the rows routed to it.
    InsertValues { rows: Vec<FilteredItem> },
    /// Literal pagination offset or row count, revised.
    Pagination { value: i64 },
    /// Column name replaced by another, e.g. a cipher column.
    Column { name: String, quote: Option<char> },
    /// Literal replaced by rendered SQL text.
    Literal { text: String },
    /// Text dropped entirely, e.g. a hint comment.
    Remove,
}

/// Replacement of the inclusive byte range `start_index..=stop_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlToken {
    pub start_index: usize,
    pub stop_index: usize,
    pub kind: TokenKind,
}

impl SqlToken {
    pub fn new(start_index: usize, stop_index: usize, kind: TokenKind) -> Self {
        Self {
            start_index,
            stop_index,
            kind,
        }
    }

    /// Ranges nested inside this token that it renders itself.
    pub fn nested_ranges(&self) -> Vec<(usize, usize)> {
        match &self.kind {
            TokenKind::InPredicate { items } | TokenKind::InsertValues { rows: items } => {
                items.iter().map(|i| (i.start_index, i.stop_index)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Text of this token for `unit`; `None` renders the logical statement.
    pub fn to_text(&self, unit: Option<&RouteUnit>) -> String {
        match &self.kind {
            TokenKind::Table { logic_table, quote } => {
                let actual = unit
                    .and_then(|u| u.actual_table(logic_table))
                    .unwrap_or(logic_table);
                quoted(actual, *quote)
            }
            TokenKind::Index {
                name,
                logic_table,
                quote,
            } => match unit.and_then(|u| u.actual_table(logic_table)) {
                Some(actual) if !eq_ignore_case(actual, logic_table) => {
                    quoted(&format!("{}_{}", name, actual), *quote)
                }
                _ => quoted(name, *quote),
            },
            TokenKind::InPredicate { items } | TokenKind::InsertValues { rows: items } => {
                let kept: Vec<&str> = match unit {
                    Some(unit) => items
                        .iter()
                        .filter(|i| i.filter.accepts(unit))
                        .map(|i| i.text.as_str())
                        .collect(),
                    None => Vec::new(),
                };
                if kept.is_empty() {
                    items.iter().map(|i| i.text.as_str()).collect::<Vec<_>>().join(", ")
                } else {
                    kept.join(", ")
                }
            }
            TokenKind::Pagination { value } => value.to_string(),
            TokenKind::Column { name, quote } => quoted(name, *quote),
            TokenKind::Literal { text } => text.clone(),
            TokenKind::Remove => String::new(),
        }
    }
}

fn quoted(name: &str, quote: Option<char>) -> String {
    match quote {
        Some('[') => format!("[{}]", name),
        Some(q) => format!("{}{}{}", q, name, q),
        None => name.to_string(),
    }
}

//! Bound statement context.
//!
//! The router does not parse SQL. An external binder hands over a
//! [`StatementContext`] describing the statement kind and every segment the
//! router or rewriter needs, each addressed by its byte range in the original
//! SQL text. Ranges are inclusive on both ends (`start_index..=stop_index`).

pub mod builder;

pub use builder::{Arg, StatementBuilder};

use crate::error::{Error, Result};
use crate::names::{eq_ignore_case, NameSet};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    AlterTable,
    DropTable,
    TruncateTable,
    CreateIndex,
    AlterIndex,
    DropIndex,
    /// Functions, procedures, tablespaces and other objects without a table.
    CreateRoutine,
    /// Table maintenance such as ANALYZE or OPTIMIZE.
    Maintenance,
    Show,
    Set,
    Transaction,
    AccessControl,
}

impl StatementKind {
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::Select
                | StatementKind::Insert
                | StatementKind::Update
                | StatementKind::Delete
        )
    }

    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            StatementKind::CreateTable
                | StatementKind::AlterTable
                | StatementKind::DropTable
                | StatementKind::TruncateTable
                | StatementKind::CreateIndex
                | StatementKind::AlterIndex
                | StatementKind::DropIndex
                | StatementKind::CreateRoutine
        )
    }

    /// ALTER INDEX / DROP INDEX: index identifiers carry no shardable value.
    pub fn is_index_alteration(&self) -> bool {
        matches!(self, StatementKind::AlterIndex | StatementKind::DropIndex)
    }

    /// Statements that must reach the primary in read/write splitting.
    pub fn is_write(&self) -> bool {
        !matches!(self, StatementKind::Select | StatementKind::Show)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSegment {
    pub name: String,
    pub alias: Option<String>,
    /// Opening quote character if the identifier is quoted; the range covers the quotes.
    pub quote: Option<char>,
    pub start_index: usize,
    pub stop_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSegment {
    pub name: String,
    /// Table name or alias qualifying the column.
    pub owner: Option<String>,
    pub quote: Option<char>,
    pub start_index: usize,
    pub stop_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSegment {
    pub name: String,
    pub quote: Option<char>,
    pub start_index: usize,
    pub stop_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentSegment {
    pub text: String,
    pub start_index: usize,
    pub stop_index: usize,
}

/// A literal or a parameter marker in the SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Literal {
        value: Value,
        start_index: usize,
        stop_index: usize,
    },
    Parameter {
        index: usize,
        start_index: usize,
        stop_index: usize,
    },
}

impl ValueExpr {
    pub fn start_index(&self) -> usize {
        match self {
            ValueExpr::Literal { start_index, .. } | ValueExpr::Parameter { start_index, .. } => {
                *start_index
            }
        }
    }

    pub fn stop_index(&self) -> usize {
        match self {
            ValueExpr::Literal { stop_index, .. } | ValueExpr::Parameter { stop_index, .. } => {
                *stop_index
            }
        }
    }

    pub fn parameter_index(&self) -> Option<usize> {
        match self {
            ValueExpr::Parameter { index, .. } => Some(*index),
            ValueExpr::Literal { .. } => None,
        }
    }

    /// Resolves the expression against the bound parameters.
    pub fn resolve(&self, parameters: &[Value]) -> Result<Value> {
        match self {
            ValueExpr::Literal { value, .. } => Ok(value.clone()),
            ValueExpr::Parameter { index, .. } => {
                parameters
                    .get(*index)
                    .cloned()
                    .ok_or(Error::ParameterIndexOutOfRange {
                        index: *index,
                        count: parameters.len(),
                    })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateOperator {
    Equal(ValueExpr),
    In(Vec<ValueExpr>),
    Between(ValueExpr, ValueExpr),
    Compare(CompareOperator, ValueExpr),
}

/// One conjunct of the WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateSegment {
    pub column: ColumnSegment,
    pub operator: PredicateOperator,
    pub start_index: usize,
    pub stop_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub values: Vec<ValueExpr>,
    pub start_index: usize,
    pub stop_index: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertContext {
    pub columns: Vec<ColumnSegment>,
    pub rows: Vec<InsertRow>,
}

impl InsertContext {
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| eq_ignore_case(&c.name, column))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSegment {
    pub column: ColumnSegment,
    pub value: ValueExpr,
    pub start_index: usize,
    pub stop_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaginationValue {
    Literal {
        value: i64,
        start_index: usize,
        stop_index: usize,
    },
    Parameter {
        index: usize,
        start_index: usize,
        stop_index: usize,
    },
}

impl PaginationValue {
    pub fn resolve(&self, parameters: &[Value]) -> Result<i64> {
        match self {
            PaginationValue::Literal { value, .. } => Ok(*value),
            PaginationValue::Parameter { index, .. } => {
                let value = parameters
                    .get(*index)
                    .ok_or(Error::ParameterIndexOutOfRange {
                        index: *index,
                        count: parameters.len(),
                    })?;
                value.as_i64().ok_or_else(|| {
                    Error::InvalidPagination(format!("parameter {} = {}", index, value))
                })
            }
        }
    }

    pub fn parameter_index(&self) -> Option<usize> {
        match self {
            PaginationValue::Parameter { index, .. } => Some(*index),
            PaginationValue::Literal { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaginationContext {
    pub offset: Option<PaginationValue>,
    pub row_count: Option<PaginationValue>,
}

impl PaginationContext {
    pub fn has_pagination(&self) -> bool {
        self.offset.is_some() || self.row_count.is_some()
    }

    pub fn actual_offset(&self, parameters: &[Value]) -> Result<i64> {
        match &self.offset {
            Some(offset) => {
                let value = offset.resolve(parameters)?;
                if value < 0 {
                    return Err(Error::InvalidPagination(format!("negative offset {}", value)));
                }
                Ok(value)
            }
            None => Ok(0),
        }
    }

    pub fn actual_row_count(&self, parameters: &[Value]) -> Result<Option<i64>> {
        match &self.row_count {
            Some(row_count) => {
                let value = row_count.resolve(parameters)?;
                if value < 0 {
                    return Err(Error::InvalidPagination(format!("negative row count {}", value)));
                }
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Everything the router and rewriter know about one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementContext {
    pub kind: StatementKind,
    pub tables: Vec<TableSegment>,
    pub predicates: Vec<PredicateSegment>,
    pub insert: Option<InsertContext>,
    pub assignments: Vec<AssignmentSegment>,
    /// Column references outside predicates and assignments (projections, ORDER BY).
    pub columns: Vec<ColumnSegment>,
    pub indexes: Vec<IndexSegment>,
    pub pagination: Option<PaginationContext>,
    pub comments: Vec<CommentSegment>,
    pub has_cursor: bool,
    pub lock_for_update: bool,
}

impl StatementContext {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            tables: Vec::new(),
            predicates: Vec::new(),
            insert: None,
            assignments: Vec::new(),
            columns: Vec::new(),
            indexes: Vec::new(),
            pagination: None,
            comments: Vec::new(),
            has_cursor: false,
            lock_for_update: false,
        }
    }

    /// Distinct table names in order of appearance.
    pub fn table_names(&self) -> NameSet {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn is_select(&self) -> bool {
        self.kind == StatementKind::Select
    }

    pub fn has_pagination(&self) -> bool {
        self.pagination
            .as_ref()
            .map(PaginationContext::has_pagination)
            .unwrap_or(false)
    }

    /// Table a column belongs to, resolving aliases. Unqualified columns resolve
    /// only when the statement references a single table.
    pub fn column_table(&self, column: &ColumnSegment) -> Option<&str> {
        match &column.owner {
            Some(owner) => self
                .tables
                .iter()
                .find(|t| {
                    t.alias.as_deref().map_or(false, |a| eq_ignore_case(a, owner))
                        || eq_ignore_case(&t.name, owner)
                })
                .map(|t| t.name.as_str()),
            None => {
                let names = self.table_names();
                if names.len() == 1 {
                    self.tables.first().map(|t| t.name.as_str())
                } else {
                    None
                }
            }
        }
    }

    /// Every column segment the statement carries, in no particular order.
    pub fn all_columns(&self) -> impl Iterator<Item = &ColumnSegment> {
        self.predicates
            .iter()
            .map(|p| &p.column)
            .chain(self.assignments.iter().map(|a| &a.column))
            .chain(self.insert.iter().flat_map(|i| i.columns.iter()))
            .chain(self.columns.iter())
    }
}

//! Locates bound segments in SQL text.
//!
//! A binder normally supplies exact segment offsets. `StatementBuilder` derives
//! them from the text instead: each call searches forward from the end of the
//! previous segment, so calls must follow the order segments appear in the SQL.
//! Searches are ASCII case-insensitive, respect identifier boundaries, and skip
//! string literals and block comments.

use super::*;

/// A value position in the SQL: literal text or a `?` marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Lit(Value),
    Param,
}

impl Arg {
    pub fn lit(value: impl Into<Value>) -> Self {
        Arg::Lit(value.into())
    }
}

pub struct StatementBuilder<'a> {
    sql: &'a str,
    code: Vec<bool>,
    cursor: usize,
    context: StatementContext,
    error: Option<Error>,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(kind: StatementKind, sql: &'a str) -> Self {
        Self {
            sql,
            code: code_mask(sql),
            cursor: 0,
            context: StatementContext::new(kind),
            error: None,
        }
    }

    pub fn table(self, name: &str) -> Self {
        self.step(|b| {
            let table = b.locate_table(name, None)?;
            b.context.tables.push(table);
            Ok(())
        })
    }

    pub fn table_as(self, name: &str, alias: &str) -> Self {
        self.step(|b| {
            let table = b.locate_table(name, Some(alias))?;
            b.locate_word(alias)?;
            b.context.tables.push(table);
            Ok(())
        })
    }

    pub fn index(self, name: &str) -> Self {
        self.step(|b| {
            let (start_index, stop_index, quote) = b.locate_identifier(name)?;
            b.context.indexes.push(IndexSegment {
                name: name.to_string(),
                quote,
                start_index,
                stop_index,
            });
            Ok(())
        })
    }

    /// A projection or ORDER BY column, `name` or `owner.name`.
    pub fn column(self, name: &str) -> Self {
        self.step(|b| {
            let column = b.locate_column(name)?;
            b.context.columns.push(column);
            Ok(())
        })
    }

    pub fn equal(self, column: &str, value: Arg) -> Self {
        self.step(|b| {
            let column = b.locate_column(column)?;
            let value = b.locate_value(&value)?;
            b.push_predicate(column, value.stop_index(), PredicateOperator::Equal(value));
            Ok(())
        })
    }

    pub fn in_list(self, column: &str, values: &[Arg]) -> Self {
        self.step(|b| {
            let column = b.locate_column(column)?;
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                items.push(b.locate_value(value)?);
            }
            let stop = items
                .last()
                .map(ValueExpr::stop_index)
                .unwrap_or(column.stop_index);
            b.push_predicate(column, stop, PredicateOperator::In(items));
            Ok(())
        })
    }

    pub fn between(self, column: &str, low: Arg, high: Arg) -> Self {
        self.step(|b| {
            let column = b.locate_column(column)?;
            let low = b.locate_value(&low)?;
            let high = b.locate_value(&high)?;
            b.push_predicate(column, high.stop_index(), PredicateOperator::Between(low, high));
            Ok(())
        })
    }

    pub fn compare(self, column: &str, operator: CompareOperator, value: Arg) -> Self {
        self.step(|b| {
            let column = b.locate_column(column)?;
            let value = b.locate_value(&value)?;
            b.push_predicate(
                column,
                value.stop_index(),
                PredicateOperator::Compare(operator, value),
            );
            Ok(())
        })
    }

    pub fn insert_columns(self, columns: &[&str]) -> Self {
        self.step(|b| {
            let mut located = Vec::with_capacity(columns.len());
            for column in columns {
                located.push(b.locate_column(column)?);
            }
            b.context.insert.get_or_insert_with(InsertContext::default).columns = located;
            Ok(())
        })
    }

    /// One parenthesised VALUES row; the segment covers the parentheses.
    pub fn insert_row(self, values: &[Arg]) -> Self {
        self.step(|b| {
            let start_index = b.locate("(", false)?.0;
            let mut row = Vec::with_capacity(values.len());
            for value in values {
                row.push(b.locate_value(value)?);
            }
            let stop_index = b.locate(")", false)?.1;
            b.context
                .insert
                .get_or_insert_with(InsertContext::default)
                .rows
                .push(InsertRow {
                    values: row,
                    start_index,
                    stop_index,
                });
            Ok(())
        })
    }

    pub fn assign(self, column: &str, value: Arg) -> Self {
        self.step(|b| {
            let column = b.locate_column(column)?;
            let value = b.locate_value(&value)?;
            let start_index = column.start_index;
            let stop_index = value.stop_index();
            b.context.assignments.push(AssignmentSegment {
                column,
                value,
                start_index,
                stop_index,
            });
            Ok(())
        })
    }

    pub fn offset(self, value: Arg) -> Self {
        self.step(|b| {
            let value = b.locate_pagination(&value)?;
            b.context
                .pagination
                .get_or_insert_with(PaginationContext::default)
                .offset = Some(value);
            Ok(())
        })
    }

    pub fn row_count(self, value: Arg) -> Self {
        self.step(|b| {
            let value = b.locate_pagination(&value)?;
            b.context
                .pagination
                .get_or_insert_with(PaginationContext::default)
                .row_count = Some(value);
            Ok(())
        })
    }

    /// The next `/* ... */` block comment.
    pub fn comment(self) -> Self {
        self.step(|b| {
            let (start_index, _) = b.locate("/*", false)?;
            let close = b.sql[start_index + 2..]
                .find("*/")
                .map(|pos| start_index + 2 + pos)
                .ok_or_else(|| Error::Binding(format!("unterminated comment at {}", start_index)))?;
            let stop_index = close + 1;
            b.context.comments.push(CommentSegment {
                text: b.sql[start_index + 2..close].trim().to_string(),
                start_index,
                stop_index,
            });
            b.cursor = stop_index + 1;
            Ok(())
        })
    }

    pub fn cursor(mut self) -> Self {
        self.context.has_cursor = true;
        self
    }

    pub fn lock_for_update(mut self) -> Self {
        self.context.lock_for_update = true;
        self
    }

    pub fn build(self) -> Result<StatementContext> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.context),
        }
    }

    fn step<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if self.error.is_none() {
            if let Err(err) = f(&mut self) {
                self.error = Some(err);
            }
        }
        self
    }

    fn push_predicate(
        &mut self,
        column: ColumnSegment,
        stop_index: usize,
        operator: PredicateOperator,
    ) {
        let start_index = column.start_index;
        self.context.predicates.push(PredicateSegment {
            column,
            operator,
            start_index,
            stop_index,
        });
    }

    fn locate_table(&mut self, name: &str, alias: Option<&str>) -> Result<TableSegment> {
        let (start_index, stop_index, quote) = self.locate_identifier(name)?;
        Ok(TableSegment {
            name: name.to_string(),
            alias: alias.map(str::to_string),
            quote,
            start_index,
            stop_index,
        })
    }

    fn locate_column(&mut self, qualified: &str) -> Result<ColumnSegment> {
        let (owner, name) = match qualified.rsplit_once('.') {
            Some((owner, name)) => (Some(owner), name),
            None => (None, qualified),
        };
        if let Some(owner) = owner {
            self.locate_identifier(owner)?;
        }
        let (start_index, stop_index, quote) = self.locate_identifier(name)?;
        Ok(ColumnSegment {
            name: name.to_string(),
            owner: owner.map(str::to_string),
            quote,
            start_index,
            stop_index,
        })
    }

    /// Finds an identifier, widening the range over surrounding quotes.
    fn locate_identifier(&mut self, name: &str) -> Result<(usize, usize, Option<char>)> {
        let (start, stop) = self.locate(name, true)?;
        let bytes = self.sql.as_bytes();
        if start > 0 {
            let open = bytes[start - 1];
            let close = match open {
                b'`' => Some(b'`'),
                b'"' => Some(b'"'),
                b'[' => Some(b']'),
                _ => None,
            };
            if let Some(close) = close {
                if bytes.get(stop + 1) == Some(&close) {
                    self.cursor = stop + 2;
                    return Ok((start - 1, stop + 1, Some(open as char)));
                }
            }
        }
        Ok((start, stop, None))
    }

    fn locate_word(&mut self, word: &str) -> Result<(usize, usize)> {
        self.locate(word, true)
    }

    fn locate_value(&mut self, arg: &Arg) -> Result<ValueExpr> {
        match arg {
            Arg::Param => {
                let (start_index, stop_index) = self.locate("?", false)?;
                Ok(ValueExpr::Parameter {
                    index: self.parameter_index(start_index),
                    start_index,
                    stop_index,
                })
            }
            Arg::Lit(value) => {
                let (start_index, stop_index) = self.locate(&value.to_sql_literal(), true)?;
                Ok(ValueExpr::Literal {
                    value: value.clone(),
                    start_index,
                    stop_index,
                })
            }
        }
    }

    fn locate_pagination(&mut self, arg: &Arg) -> Result<PaginationValue> {
        match self.locate_value(arg)? {
            ValueExpr::Parameter {
                index,
                start_index,
                stop_index,
            } => Ok(PaginationValue::Parameter {
                index,
                start_index,
                stop_index,
            }),
            ValueExpr::Literal {
                value,
                start_index,
                stop_index,
            } => match value {
                Value::Int(value) => Ok(PaginationValue::Literal {
                    value,
                    start_index,
                    stop_index,
                }),
                other => Err(Error::InvalidPagination(other.to_string())),
            },
        }
    }

    /// Searches code text from the cursor; returns an inclusive range and advances.
    fn locate(&mut self, pattern: &str, word: bool) -> Result<(usize, usize)> {
        let start = self.find(pattern, self.cursor, word).ok_or_else(|| {
            Error::Binding(format!(
                "cannot locate '{}' after offset {} in: {}",
                pattern, self.cursor, self.sql
            ))
        })?;
        let stop = start + pattern.len() - 1;
        self.cursor = stop + 1;
        Ok((start, stop))
    }

    fn find(&self, pattern: &str, from: usize, word: bool) -> Option<usize> {
        let bytes = self.sql.as_bytes();
        let pat = pattern.as_bytes();
        if pat.is_empty() || pat.len() > bytes.len() {
            return None;
        }
        (from..=bytes.len() - pat.len()).find(|&i| {
            self.code[i]
                && bytes[i..i + pat.len()].eq_ignore_ascii_case(pat)
                && (!word
                    || ((i == 0 || !is_ident(bytes[i - 1]))
                        && bytes.get(i + pat.len()).map_or(true, |&b| !is_ident(b))))
        })
    }

    fn parameter_index(&self, position: usize) -> usize {
        self.sql.as_bytes()[..position]
            .iter()
            .zip(&self.code)
            .filter(|(&b, &code)| code && b == b'?')
            .count()
    }
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Marks bytes that are SQL code. Opening quotes and comment openers count as
/// code so literals and comments can still be located.
fn code_mask(sql: &str) -> Vec<bool> {
    let bytes = sql.as_bytes();
    let mut mask = vec![true; bytes.len()];
    let mut i = 0;
    while i < bytes.len() {
        let end = match bytes[i] {
            b'\'' => {
                let mut j = i + 1;
                while j < bytes.len() {
                    if bytes[j] == b'\'' {
                        if bytes.get(j + 1) == Some(&b'\'') {
                            j += 2;
                            continue;
                        }
                        break;
                    }
                    j += 1;
                }
                j
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => sql[i + 2..]
                .find("*/")
                .map(|pos| i + 2 + pos + 1)
                .unwrap_or(bytes.len()),
            _ => {
                i += 1;
                continue;
            }
        };
        let end = end.min(bytes.len() - 1);
        for flag in mask.iter_mut().take(end + 1).skip(i + 1) {
            *flag = false;
        }
        i = end + 1;
    }
    mask
}

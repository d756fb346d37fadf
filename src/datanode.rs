//! Actual data nodes and their naming conventions.

use std::fmt;

use crate::error::{Error, Result};

/// One physical table in one physical data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            table: table.into(),
        }
    }

    /// Parses `data_source.table`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() && !table.contains('.') => {
                Ok(Self::new(ds.trim(), table.trim()))
            }
            _ => Err(Error::Config(format!(
                "invalid data node '{}', expected <data_source>.<table>",
                text
            ))),
        }
    }

    pub fn matches(&self, data_source: &str, table: &str) -> bool {
        self.data_source.eq_ignore_ascii_case(data_source) && self.table.eq_ignore_ascii_case(table)
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

pub const DEFAULT_PADDING_CHAR: char = '0';

/// Naming convention used to turn a shard index into an actual name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNodeInfo {
    pub prefix: String,
    pub suffix_min_length: usize,
    pub padding_char: char,
}

impl DataNodeInfo {
    pub fn new(prefix: impl Into<String>, suffix_min_length: usize, padding_char: char) -> Self {
        Self {
            prefix: prefix.into(),
            suffix_min_length,
            padding_char,
        }
    }

    /// Derives the convention from actual table names of `logic_table`.
    ///
    /// `t_order_0 .. t_order_2` yields prefix `t_order_` and suffix length 1;
    /// `t_order_00 .. t_order_05` yields suffix length 2.
    pub fn for_tables<'a>(logic_table: &str, tables: impl IntoIterator<Item = &'a str>) -> Self {
        let tables: Vec<&str> = tables.into_iter().collect();
        let prefix = match tables.first() {
            Some(first) if starts_with_ignore_case(first, logic_table) => {
                let (head, tail) = first.split_at(logic_table.len());
                format!("{}{}", head, strip_digits(tail))
            }
            Some(first) => strip_digits(first).to_string(),
            None => logic_table.to_string(),
        };
        Self::new(prefix.clone(), min_suffix(&prefix, &tables), DEFAULT_PADDING_CHAR)
    }

    pub fn for_data_sources<'a>(data_sources: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<&str> = data_sources.into_iter().collect();
        let prefix = names.first().map(|n| strip_digits(n).to_string()).unwrap_or_default();
        Self::new(prefix.clone(), min_suffix(&prefix, &names), DEFAULT_PADDING_CHAR)
    }

    pub fn actual_name(&self, index: u64) -> String {
        let digits = index.to_string();
        let mut name = self.prefix.clone();
        for _ in digits.len()..self.suffix_min_length {
            name.push(self.padding_char);
        }
        name.push_str(&digits);
        name
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn strip_digits(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_ascii_digit())
}

fn min_suffix(prefix: &str, names: &[&str]) -> usize {
    names
        .iter()
        .map(|n| n.len().saturating_sub(prefix.len()))
        .min()
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    /// Body of a `${...}` (or `$->{...}`) group.
    Group(String),
}

/// Splits an inline expression into literal text and `${...}` groups.
pub(crate) fn parse_segments(expression: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = expression;
    while !rest.is_empty() {
        let open = if rest.starts_with("${") {
            Some(2)
        } else if rest.starts_with("$->{") {
            Some(4)
        } else {
            None
        };
        match open {
            Some(skip) => {
                let close = rest.find('}').ok_or_else(|| Error::InlineExpression {
                    expression: expression.to_string(),
                    reason: "unclosed '${'".to_string(),
                })?;
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Group(rest[skip..close].trim().to_string()));
                rest = &rest[close + 1..];
            }
            None => {
                let ch = rest.chars().next().unwrap_or_default();
                text.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Expands `ds_${0..1}.t_order_${0..2}` style expressions. Comma-separated
/// parts are expanded independently and concatenated; groups inside a part
/// expand to their Cartesian product, leftmost group outermost.
pub fn expand_inline(expression: &str) -> Result<Vec<String>> {
    let mut result = Vec::new();
    for part in split_top_level(expression) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut names = vec![String::new()];
        for segment in parse_segments(part)? {
            let choices = match segment {
                Segment::Text(text) => vec![text],
                Segment::Group(body) => expand_group(expression, &body)?,
            };
            names = names
                .iter()
                .flat_map(|prefix| choices.iter().map(move |c| format!("{}{}", prefix, c)))
                .collect();
        }
        result.extend(names);
    }
    Ok(result)
}

/// Expands an expression of `data_source.table` nodes.
pub fn expand_data_nodes(expression: &str) -> Result<Vec<DataNode>> {
    expand_inline(expression)?
        .iter()
        .map(|node| DataNode::parse(node))
        .collect()
}

fn split_top_level(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in expression.char_indices() {
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

fn expand_group(expression: &str, body: &str) -> Result<Vec<String>> {
    let invalid = |reason: String| Error::InlineExpression {
        expression: expression.to_string(),
        reason,
    };
    if let Some(list) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
        return Ok(list
            .split(',')
            .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .filter(|item| !item.is_empty())
            .collect());
    }
    if let Some((low, high)) = body.split_once("..") {
        let low: i64 = low
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid range start '{}'", low.trim())))?;
        let high: i64 = high
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid range end '{}'", high.trim())))?;
        if low > high {
            return Err(invalid(format!("empty range {}..{}", low, high)));
        }
        return Ok((low..=high).map(|i| i.to_string()).collect());
    }
    if body.is_empty() {
        return Err(invalid("empty group".to_string()));
    }
    Ok(vec![body.trim_matches(|c| c == '\'' || c == '"').to_string()])
}

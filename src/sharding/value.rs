use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use crate::datanode::DataNodeInfo;
use crate::names::eq_ignore_case;
use crate::value::Value;

/// Orders two values of compatible type; mixed integer/float compare numerically.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// A possibly unbounded value range.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardingRange {
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl ShardingRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn closed(low: Value, high: Value) -> Self {
        Self {
            lower: Bound::Included(low),
            upper: Bound::Included(high),
        }
    }

    pub fn at_least(value: Value) -> Self {
        Self {
            lower: Bound::Included(value),
            upper: Bound::Unbounded,
        }
    }

    pub fn greater_than(value: Value) -> Self {
        Self {
            lower: Bound::Excluded(value),
            upper: Bound::Unbounded,
        }
    }

    pub fn at_most(value: Value) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(value),
        }
    }

    pub fn less_than(value: Value) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(value),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(low) => matches!(
                compare_values(value, low),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Bound::Excluded(low) => compare_values(value, low) == Some(Ordering::Greater),
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(high) => matches!(
                compare_values(value, high),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Bound::Excluded(high) => compare_values(value, high) == Some(Ordering::Less),
        };
        above && below
    }

    /// Intersection of two ranges. Incomparable bounds keep `self`'s bound.
    pub fn intersect(&self, other: &ShardingRange) -> ShardingRange {
        ShardingRange {
            lower: tighter(&self.lower, &other.lower, Ordering::Greater),
            upper: tighter(&self.upper, &other.upper, Ordering::Less),
        }
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(low), Bound::Included(high)) => {
                compare_values(low, high) == Some(Ordering::Greater)
            }
            (Bound::Included(low) | Bound::Excluded(low), Bound::Excluded(high))
            | (Bound::Excluded(low), Bound::Included(high)) => {
                matches!(
                    compare_values(low, high),
                    Some(Ordering::Greater | Ordering::Equal)
                )
            }
            _ => false,
        }
    }

    /// Integer bounds as an inclusive pair, `None` where unbounded.
    pub fn integer_bounds(&self) -> Option<(Option<i64>, Option<i64>)> {
        let lower = match &self.lower {
            Bound::Unbounded => None,
            Bound::Included(v) => Some(v.as_i64()?),
            Bound::Excluded(v) => Some(v.as_i64()?.checked_add(1)?),
        };
        let upper = match &self.upper {
            Bound::Unbounded => None,
            Bound::Included(v) => Some(v.as_i64()?),
            Bound::Excluded(v) => Some(v.as_i64()?.checked_sub(1)?),
        };
        Some((lower, upper))
    }
}

fn tighter(left: &Bound<Value>, right: &Bound<Value>, keep: Ordering) -> Bound<Value> {
    match (left, right) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => {
            match compare_values(a, b) {
                Some(Ordering::Equal) => {
                    if matches!(left, Bound::Excluded(_)) {
                        left.clone()
                    } else {
                        right.clone()
                    }
                }
                Some(ord) if ord == keep => left.clone(),
                Some(_) => right.clone(),
                None => left.clone(),
            }
        }
    }
}

impl fmt::Display for ShardingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Bound::Unbounded => write!(f, "(-inf")?,
            Bound::Included(v) => write!(f, "[{}", v)?,
            Bound::Excluded(v) => write!(f, "({}", v)?,
        }
        match &self.upper {
            Bound::Unbounded => write!(f, "..+inf)"),
            Bound::Included(v) => write!(f, "..{}]", v),
            Bound::Excluded(v) => write!(f, "..{})", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    List(Vec<Value>),
    Range(ShardingRange),
}

/// Values one sharding column can take for one logic table.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardingConditionValue {
    pub table: String,
    pub column: String,
    pub kind: ConditionKind,
}

impl ShardingConditionValue {
    pub fn list(table: impl Into<String>, column: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            kind: ConditionKind::List(values),
        }
    }

    pub fn range(
        table: impl Into<String>,
        column: impl Into<String>,
        range: ShardingRange,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            kind: ConditionKind::Range(range),
        }
    }

    pub fn is_for(&self, table: &str, column: &str) -> bool {
        eq_ignore_case(&self.table, table) && eq_ignore_case(&self.column, column)
    }

    /// Conjunction with another condition on the same column.
    pub fn merge(&self, other: &ShardingConditionValue) -> ShardingConditionValue {
        let kind = match (&self.kind, &other.kind) {
            (ConditionKind::List(a), ConditionKind::List(b)) => ConditionKind::List(
                a.iter()
                    .filter(|v| b.iter().any(|w| compare_values(v, w) == Some(Ordering::Equal)))
                    .cloned()
                    .collect(),
            ),
            (ConditionKind::List(values), ConditionKind::Range(range))
            | (ConditionKind::Range(range), ConditionKind::List(values)) => ConditionKind::List(
                values.iter().filter(|v| range.contains(v)).cloned().collect(),
            ),
            (ConditionKind::Range(a), ConditionKind::Range(b)) => {
                ConditionKind::Range(a.intersect(b))
            }
        };
        ShardingConditionValue {
            table: self.table.clone(),
            column: self.column.clone(),
            kind,
        }
    }

    /// True when no value can satisfy the condition.
    pub fn is_always_false(&self) -> bool {
        match &self.kind {
            ConditionKind::List(values) => values.is_empty(),
            ConditionKind::Range(range) => range.is_empty(),
        }
    }
}

/// Argument for one precise algorithm call.
#[derive(Debug, Clone, Copy)]
pub struct PreciseShardingValue<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub data_node_info: &'a DataNodeInfo,
    pub value: &'a Value,
}

/// Argument for one range algorithm call.
#[derive(Debug, Clone, Copy)]
pub struct RangeShardingValue<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub data_node_info: &'a DataNodeInfo,
    pub range: &'a ShardingRange,
}

/// Argument for a multi-column algorithm call.
#[derive(Debug, Clone)]
pub struct ComplexShardingValue<'a> {
    pub table: &'a str,
    pub data_node_info: &'a DataNodeInfo,
    pub values: Vec<(&'a str, &'a [Value])>,
    pub ranges: Vec<(&'a str, &'a ShardingRange)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_list_with_list() {
        let a = ShardingConditionValue::list("t_order", "order_id", vec![1.into(), 2.into()]);
        let b = ShardingConditionValue::list("t_order", "order_id", vec![2.into(), 3.into()]);
        assert_eq!(a.merge(&b).kind, ConditionKind::List(vec![Value::Int(2)]));

        let c = ShardingConditionValue::list("t_order", "order_id", vec![1.into()]);
        assert!(c.merge(&b).is_always_false());
    }

    #[test]
    fn test_merge_list_with_range() {
        let list = ShardingConditionValue::list("t", "id", vec![1.into(), 5.into(), 9.into()]);
        let range =
            ShardingConditionValue::range("t", "id", ShardingRange::closed(2.into(), 9.into()));
        assert_eq!(
            list.merge(&range).kind,
            ConditionKind::List(vec![Value::Int(5), Value::Int(9)])
        );
    }

    #[test]
    fn test_range_intersection() {
        let a = ShardingRange::at_least(Value::Int(3));
        let b = ShardingRange::less_than(Value::Int(10));
        let both = a.intersect(&b);
        assert_eq!(both.integer_bounds(), Some((Some(3), Some(9))));
        assert!(both.contains(&Value::Int(9)));
        assert!(!both.contains(&Value::Int(10)));

        let empty = ShardingRange::greater_than(Value::Int(5))
            .intersect(&ShardingRange::at_most(Value::Int(5)));
        assert!(empty.is_empty());
    }
}

use super::*;

use crate::datanode::{parse_segments, Segment};
use crate::value::Value;

const ALGORITHM_EXPRESSION: &str = "algorithm-expression";
const ALLOW_RANGE_QUERY: &str = "allow-range-query-with-inline-sharding";
const SHARDING_COLUMNS: &str = "sharding-columns";

/// Name template such as `t_order_${order_id % 3}`.
#[derive(Debug, Clone)]
struct Template {
    source: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Expr(Expr),
}

impl Template {
    fn parse(owner: &str, source: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidProperty {
            owner: owner.to_string(),
            key: ALGORITHM_EXPRESSION.to_string(),
            reason,
        };
        let mut parts = Vec::new();
        for segment in parse_segments(source).map_err(|e| invalid(e.to_string()))? {
            match segment {
                Segment::Text(text) => parts.push(Part::Text(text)),
                Segment::Group(body) => parts.push(Part::Expr(
                    Parser::new(&body).parse().map_err(|reason| {
                        invalid(format!("'{}': {}", body, reason))
                    })?,
                )),
            }
        }
        if !parts.iter().any(|p| matches!(p, Part::Expr(_))) {
            return Err(invalid(format!("'{}' has no ${{...}} placeholder", source)));
        }
        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    fn render(
        &self,
        lookup: &dyn Fn(&str) -> Option<Value>,
    ) -> std::result::Result<String, String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Expr(expr) => out.push_str(&expr.eval(lookup)?.to_string()),
            }
        }
        Ok(out)
    }

    fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        for part in &self.parts {
            if let Part::Expr(expr) = part {
                expr.collect_variables(&mut names);
            }
        }
        names
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Int(i64),
    Var(String),
    Neg(Box<Expr>),
    Binary(Box<Expr>, char, Box<Expr>),
}

impl Expr {
    fn eval(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> std::result::Result<Value, String> {
        match self {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Var(name) => lookup(name).ok_or_else(|| format!("unbound variable '{}'", name)),
            Expr::Neg(inner) => {
                let v = as_int(&inner.eval(lookup)?)?;
                v.checked_neg().map(Value::Int).ok_or_else(|| "overflow".to_string())
            }
            Expr::Binary(left, op, right) => {
                let a = as_int(&left.eval(lookup)?)?;
                let b = as_int(&right.eval(lookup)?)?;
                let result = match op {
                    '+' => a.checked_add(b),
                    '-' => a.checked_sub(b),
                    '*' => a.checked_mul(b),
                    '/' if b == 0 => return Err("division by zero".to_string()),
                    '/' => a.checked_div(b),
                    '%' if b == 0 => return Err("modulo by zero".to_string()),
                    '%' => a.checked_rem(b),
                    _ => None,
                };
                result.map(Value::Int).ok_or_else(|| "overflow".to_string())
            }
        }
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Expr::Var(name) => {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    names.push(name.clone());
                }
            }
            Expr::Neg(inner) => inner.collect_variables(names),
            Expr::Binary(left, _, right) => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Int(_) => {}
        }
    }
}

fn as_int(value: &Value) -> std::result::Result<i64, String> {
    value
        .as_i64()
        .ok_or_else(|| format!("'{}' is not an integer", value))
}

/// Recursive descent over `+ - * / %`, parentheses and unary minus.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> std::result::Result<Expr, String> {
        let expr = self.additive()?;
        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(format!("unexpected input at {}", self.pos));
        }
        Ok(expr)
    }

    fn skip_ws(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.input.get(self.pos).copied()
    }

    fn additive(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.multiplicative()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary(Box::new(left), op as char, Box::new(right));
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.unary()?;
        while let Some(op @ (b'*' | b'/' | b'%')) = self.peek() {
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(Box::new(left), op as char, Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> std::result::Result<Expr, String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let expr = self.additive()?;
                if self.peek() != Some(b')') {
                    return Err("missing ')'".to_string());
                }
                self.pos += 1;
                Ok(expr)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.input[start..self.pos]);
                text.parse()
                    .map(Expr::Int)
                    .map_err(|_| format!("invalid number '{}'", text))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let start = self.pos;
                while self.pos < self.input.len()
                    && (self.input[self.pos].is_ascii_alphanumeric()
                        || self.input[self.pos] == b'_')
                {
                    self.pos += 1;
                }
                Ok(Expr::Var(
                    String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(),
                ))
            }
            Some(c) => Err(format!("unexpected '{}'", c as char)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Single-column inline expression, e.g. `t_order_${order_id % 3}`.
#[derive(Debug, Clone)]
pub struct InlineShardingAlgorithm {
    template: Template,
    allow_range_query: bool,
}

impl InlineShardingAlgorithm {
    pub fn new(props: &Properties) -> Result<Self> {
        let expression = props.require_str("INLINE", ALGORITHM_EXPRESSION)?;
        Ok(Self {
            template: Template::parse("INLINE", &expression)?,
            allow_range_query: props.get_bool(ALLOW_RANGE_QUERY).unwrap_or(false),
        })
    }
}

impl ShardingAlgorithm for InlineShardingAlgorithm {
    fn algorithm_type(&self) -> &'static str {
        "INLINE"
    }

    fn do_sharding(
        &self,
        _available: &NameSet,
        value: &PreciseShardingValue<'_>,
    ) -> Result<String> {
        let column = value.column;
        let bound = value.value.clone();
        self.template
            .render(&|name: &str| {
                if name.eq_ignore_ascii_case(column) || name == "it" {
                    Some(bound.clone())
                } else {
                    None
                }
            })
            .map_err(|reason| Error::AlgorithmFailed {
                algorithm: format!("INLINE({})", self.template.source),
                table: value.table.to_string(),
                column: column.to_string(),
                reason,
            })
    }

    fn do_range_sharding(
        &self,
        available: &NameSet,
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        if self.allow_range_query {
            return Ok(all_available(available));
        }
        Err(Error::AlgorithmFailed {
            algorithm: "INLINE".to_string(),
            table: value.table.to_string(),
            column: value.column.to_string(),
            reason: format!(
                "range {} needs {}=true",
                value.range, ALLOW_RANGE_QUERY
            ),
        })
    }
}

/// Multi-column inline expression, e.g. `t_order_${(user_id + order_id) % 4}`.
#[derive(Debug, Clone)]
pub struct ComplexInlineShardingAlgorithm {
    template: Template,
    columns: Vec<String>,
    allow_range_query: bool,
}

impl ComplexInlineShardingAlgorithm {
    pub fn new(props: &Properties) -> Result<Self> {
        let expression = props.require_str("COMPLEX_INLINE", ALGORITHM_EXPRESSION)?;
        let template = Template::parse("COMPLEX_INLINE", &expression)?;
        let columns = match props.get_str(SHARDING_COLUMNS) {
            Some(columns) => columns
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            None => template.variables(),
        };
        Ok(Self {
            template,
            columns,
            allow_range_query: props.get_bool(ALLOW_RANGE_QUERY).unwrap_or(false),
        })
    }

    fn fail(&self, table: &str, reason: String) -> Error {
        Error::AlgorithmFailed {
            algorithm: format!("COMPLEX_INLINE({})", self.template.source),
            table: table.to_string(),
            column: self.columns.join(","),
            reason,
        }
    }
}

impl ShardingAlgorithm for ComplexInlineShardingAlgorithm {
    fn algorithm_type(&self) -> &'static str {
        "COMPLEX_INLINE"
    }

    fn do_sharding(&self, available: &NameSet, value: &PreciseShardingValue<'_>) -> Result<String> {
        let values = [value.value.clone()];
        let complex = ComplexShardingValue {
            table: value.table,
            data_node_info: value.data_node_info,
            values: vec![(value.column, &values[..])],
            ranges: Vec::new(),
        };
        self.do_complex_sharding(available, &complex)?
            .into_iter()
            .next()
            .ok_or_else(|| self.fail(value.table, "no target".to_string()))
    }

    fn do_range_sharding(
        &self,
        available: &NameSet,
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        let complex = ComplexShardingValue {
            table: value.table,
            data_node_info: value.data_node_info,
            values: Vec::new(),
            ranges: vec![(value.column, value.range)],
        };
        self.do_complex_sharding(available, &complex)
    }

    fn do_complex_sharding(
        &self,
        available: &NameSet,
        value: &ComplexShardingValue<'_>,
    ) -> Result<Vec<String>> {
        if !value.ranges.is_empty() {
            if self.allow_range_query {
                return Ok(all_available(available));
            }
            let reason = format!("range query needs {}=true", ALLOW_RANGE_QUERY);
            return Err(self.fail(value.table, reason));
        }
        let mut per_column: Vec<(&str, &[Value])> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match value
                .values
                .iter()
                .find(|(c, _)| c.eq_ignore_ascii_case(column))
            {
                Some((_, values)) => per_column.push((column.as_str(), *values)),
                None => return Ok(all_available(available)),
            }
        }

        let mut combinations: Vec<Vec<(&str, &Value)>> = vec![Vec::new()];
        for (column, values) in &per_column {
            combinations = combinations
                .iter()
                .flat_map(|combo| {
                    values.iter().map(move |v| {
                        let mut next = combo.clone();
                        next.push((*column, v));
                        next
                    })
                })
                .collect();
        }

        let mut targets = NameSet::new();
        for combo in combinations {
            let name = self
                .template
                .render(&|name: &str| {
                    combo
                        .iter()
                        .find(|(c, _)| c.eq_ignore_ascii_case(name))
                        .map(|(_, v)| (*v).clone())
                })
                .map_err(|reason| self.fail(value.table, reason))?;
            targets.insert(name);
        }
        Ok(targets.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datanode::DataNodeInfo;
    use crate::sharding::value::ShardingRange;

    fn props(expression: &str) -> Properties {
        Properties::new().with(ALGORITHM_EXPRESSION, expression)
    }

    #[test]
    fn test_inline_expression() {
        let algorithm = InlineShardingAlgorithm::new(&props("t_order_${order_id % 3}")).unwrap();
        let available = NameSet::new();
        let info = DataNodeInfo::new("t_order_", 1, '0');
        let value = Value::Int(7);
        let target = algorithm
            .do_sharding(
                &available,
                &PreciseShardingValue {
                    table: "t_order",
                    column: "order_id",
                    data_node_info: &info,
                    value: &value,
                },
            )
            .unwrap();
        assert_eq!(target, "t_order_1");
    }

    #[test]
    fn test_inline_precedence_and_legacy_syntax() {
        let algorithm =
            InlineShardingAlgorithm::new(&props("ds_$->{(user_id + 1) * 2 % 4 - -1}")).unwrap();
        let rendered = algorithm
            .template
            .render(&|_| Some(Value::Int(2)))
            .unwrap();
        // ((2 + 1) * 2) % 4 + 1
        assert_eq!(rendered, "ds_3");
    }

    #[test]
    fn test_inline_rejects_bad_expression() {
        assert!(InlineShardingAlgorithm::new(&props("t_order")).is_err());
        assert!(InlineShardingAlgorithm::new(&props("t_${order_id %}")).is_err());
        assert!(InlineShardingAlgorithm::new(&Properties::new()).is_err());
    }

    #[test]
    fn test_inline_range_needs_flag() {
        let available: NameSet = ["t_0", "t_1"].into_iter().collect();
        let info = DataNodeInfo::new("t_", 1, '0');
        let range = ShardingRange::closed(Value::Int(1), Value::Int(5));
        let value = RangeShardingValue {
            table: "t",
            column: "id",
            data_node_info: &info,
            range: &range,
        };
        let strict = InlineShardingAlgorithm::new(&props("t_${id % 2}")).unwrap();
        assert!(strict.do_range_sharding(&available, &value).is_err());

        let relaxed = InlineShardingAlgorithm::new(
            &props("t_${id % 2}").with(ALLOW_RANGE_QUERY, true),
        )
        .unwrap();
        assert_eq!(relaxed.do_range_sharding(&available, &value).unwrap().len(), 2);
    }

    #[test]
    fn test_complex_inline_cartesian() {
        let algorithm = ComplexInlineShardingAlgorithm::new(
            &props("t_${(user_id + order_id) % 4}").with(SHARDING_COLUMNS, "user_id, order_id"),
        )
        .unwrap();
        let available: NameSet = ["t_0", "t_1", "t_2", "t_3"].into_iter().collect();
        let info = DataNodeInfo::new("t_", 1, '0');
        let users = [Value::Int(1)];
        let orders = [Value::Int(1), Value::Int(2)];
        let targets = algorithm
            .do_complex_sharding(
                &available,
                &ComplexShardingValue {
                    table: "t",
                    data_node_info: &info,
                    values: vec![("user_id", &users[..]), ("order_id", &orders[..])],
                    ranges: Vec::new(),
                },
            )
            .unwrap();
        assert_eq!(targets, vec!["t_2", "t_3"]);
    }
}

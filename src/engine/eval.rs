//! In-process expression evaluation.
//!
//! Used where no database is involved: PRODUCE payloads without a relation,
//! REQUEST headers and options, IMPORT options, and CONSUME filters against
//! queue messages. Comparisons follow SQL three-valued logic.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, CaseExpr, Expr, FunctionCall, OptionItem, OrderItem, SelectItem, SortOrder, UnaryOp, Value};
use crate::engine::Record;
use crate::engine::context::VarValue;
use crate::error::ExecutionError;

pub struct Evaluator<'a> {
    variables: &'a IndexMap<String, VarValue>,
    row: Option<&'a Record>,
}

impl<'a> Evaluator<'a> {
    pub fn new(variables: &'a IndexMap<String, VarValue>) -> Self {
        Self { variables, row: None }
    }

    /// Resolve identifiers against this record.
    pub fn with_row(mut self, row: &'a Record) -> Self {
        self.row = Some(row);
        self
    }

    /// True only when the predicate is TRUE; NULL filters the row out.
    pub fn matches(&self, predicate: &Expr) -> Result<bool, ExecutionError> {
        Ok(matches!(self.eval(predicate)?, Value::Bool(true)))
    }

    /// Evaluate select items into a record, expanding wildcards from the row.
    pub fn project(&self, items: &[SelectItem]) -> Result<Record, ExecutionError> {
        let mut out = Record::new();
        for (i, item) in items.iter().enumerate() {
            if let Expr::Wildcard { .. } = item.expr {
                if let Some(row) = self.row {
                    out.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                continue;
            }
            let name = item.output_name().unwrap_or_else(|| format!("column{}", i + 1));
            out.insert(name, self.eval(&item.expr)?);
        }
        Ok(out)
    }

    /// Evaluate a `WITH (key = value, ...)` list.
    pub fn options(&self, options: &[OptionItem]) -> Result<Record, ExecutionError> {
        options
            .iter()
            .map(|o| Ok((o.key.clone(), self.eval(&o.value)?)))
            .collect()
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, ExecutionError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Variable { name, .. } => self
                .variables
                .get(&name.to_lowercase())
                .ok_or_else(|| ExecutionError::UnboundVariable(name.clone()))?
                .as_scalar(name)
                .cloned(),
            Expr::Identifier(id) => {
                let row = self.row.ok_or_else(|| {
                    ExecutionError::Evaluation(format!("column '{}' has no row to read from", id.dotted()))
                })?;
                lookup(row, id.name())
                    .cloned()
                    .ok_or_else(|| ExecutionError::Evaluation(format!("column '{}' is missing from the record", id.dotted())))
            }
            Expr::Grouping { inner, .. } => self.eval(inner),
            Expr::Unary { op, operand, .. } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (_, Value::Null) => Ok(Value::Null),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(n)) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| ExecutionError::Evaluation(format!("integer overflow in -({})", n))),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (op, v) => Err(type_error(&format!("{:?}", op), &v)),
                }
            }
            Expr::Binary { left, op, right, .. } => self.binary(left, *op, right),
            Expr::IsNull { expr, negated, .. } => {
                let is_null = self.eval(expr)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::InList { expr, list, negated, .. } => {
                let value = self.eval(expr)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    if let Expr::Subquery { .. } = item {
                        return Err(needs_database("IN (SELECT ...)"));
                    }
                    match compare(&value, &self.eval(item)?)? {
                        Some(Ordering::Equal) => return Ok(Value::Bool(!negated)),
                        Some(_) => {}
                        None => saw_null = true,
                    }
                }
                if saw_null {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Bool(*negated))
                }
            }
            Expr::Case(case) => self.case(case),
            Expr::Function(call) => self.function(call),
            Expr::Wildcard { .. } => Err(ExecutionError::Evaluation("'*' is not a value".to_string())),
            Expr::Subquery { .. } => Err(needs_database("subquery")),
            Expr::Exists { .. } => Err(needs_database("EXISTS")),
        }
    }

    fn binary(&self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<Value, ExecutionError> {
        let l = self.eval(left)?;
        // AND/OR short-circuit on the deciding value
        match (op, &l) {
            (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
            _ => {}
        }
        let r = self.eval(right)?;
        match op {
            BinaryOp::And | BinaryOp::Or => logical(op, l, r),
            BinaryOp::Like | BinaryOp::NotLike => match (l, r) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (Value::String(text), Value::String(pattern)) => {
                    Ok(Value::Bool(like(&text, &pattern) == (op == BinaryOp::Like)))
                }
                (v, _) => Err(type_error("LIKE", &v)),
            },
            op if op.is_comparison() => {
                let Some(ordering) = compare(&l, &r)? else {
                    return Ok(Value::Null);
                };
                Ok(Value::Bool(match op {
                    BinaryOp::Eq => ordering == Ordering::Equal,
                    BinaryOp::NotEq => ordering != Ordering::Equal,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            BinaryOp::Concat => match (l, r) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (l, r) => Ok(Value::String(format!("{}{}", text_of(&l), text_of(&r)))),
            },
            _ => arithmetic(op, l, r),
        }
    }

    fn case(&self, case: &CaseExpr) -> Result<Value, ExecutionError> {
        let operand = case.operand.as_ref().map(|o| self.eval(o)).transpose()?;
        for clause in &case.when_clauses {
            let hit = match &operand {
                Some(value) => compare(value, &self.eval(&clause.condition)?)? == Some(Ordering::Equal),
                None => self.matches(&clause.condition)?,
            };
            if hit {
                return self.eval(&clause.result);
            }
        }
        match &case.else_result {
            Some(e) => self.eval(e),
            None => Ok(Value::Null),
        }
    }

    fn function(&self, call: &FunctionCall) -> Result<Value, ExecutionError> {
        let name = call.name.to_uppercase();
        if call.over.is_some() || call.is_aggregate() {
            return Err(needs_database(&name));
        }
        let args = call
            .args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;
        match (name.as_str(), args.as_slice()) {
            ("COALESCE", args) => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
            ("CONCAT", args) => Ok(Value::String(args.iter().map(text_of).collect())),
            ("NOW", []) | ("CURRENT_TIMESTAMP", []) => Ok(Value::Timestamp(chrono::Local::now().naive_local())),
            (_, [Value::Null]) => Ok(Value::Null),
            ("UPPER", [v]) => Ok(Value::String(text_of(v).to_uppercase())),
            ("LOWER", [v]) => Ok(Value::String(text_of(v).to_lowercase())),
            ("TRIM", [v]) => Ok(Value::String(text_of(v).trim().to_string())),
            ("LENGTH", [v]) | ("LEN", [v]) => Ok(Value::Int(text_of(v).chars().count() as i64)),
            ("ABS", [Value::Int(n)]) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| ExecutionError::Evaluation(format!("integer overflow in ABS({})", n))),
            ("ABS", [Value::Float(f)]) => Ok(Value::Float(f.abs())),
            _ => Err(ExecutionError::Evaluation(format!(
                "function {}() with {} argument(s) cannot be evaluated here",
                name,
                args.len()
            ))),
        }
    }
}

/// Stable sort by ORDER BY items, each evaluated against the record
/// `row` picks out of an item.
pub fn sort_by_order<T>(
    items: Vec<T>,
    order_by: &[OrderItem],
    variables: &IndexMap<String, VarValue>,
    row: impl Fn(&T) -> &Record,
) -> Result<Vec<T>, ExecutionError> {
    if order_by.is_empty() {
        return Ok(items);
    }
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let eval = Evaluator::new(variables).with_row(row(&item));
        let keys = order_by
            .iter()
            .map(|o| eval.eval(&o.expr))
            .collect::<Result<Vec<_>, _>>()?;
        keyed.push((keys, item));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for ((x, y), item) in a.iter().zip(b).zip(order_by) {
            let ord = sort_key(x, y);
            let ord = match item.direction {
                Some(SortOrder::Desc) => ord.reverse(),
                _ => ord,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn lookup<'r>(row: &'r Record, column: &str) -> Option<&'r Value> {
    row.get(column)
        .or_else(|| row.iter().find(|(k, _)| k.eq_ignore_ascii_case(column)).map(|(_, v)| v))
}

/// NULL sorts first; values that do not compare keep their order.
fn sort_key(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => compare(a, b).ok().flatten().unwrap_or(Ordering::Equal),
    }
}

/// `None` when either side is NULL.
fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, ExecutionError> {
    let ordering = match (a, b) {
        (Value::Null, _) | (_, Value::Null) => return Ok(None),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Timestamp(_), Value::String(s)) | (Value::String(s), Value::Timestamp(_)) => {
            let parsed = Value::parse_timestamp(s)
                .ok_or_else(|| ExecutionError::Evaluation(format!("'{}' is not a timestamp", s)))?;
            return match a {
                Value::Timestamp(_) => compare(a, &parsed),
                _ => compare(&parsed, b),
            };
        }
        (Value::Json(x), Value::Json(y)) if x == y => Ordering::Equal,
        (x, y) => {
            return Err(ExecutionError::Evaluation(format!(
                "cannot compare {} with {}",
                x.data_type(),
                y.data_type()
            )));
        }
    };
    Ok(Some(ordering))
}

fn logical(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExecutionError> {
    let as_bool = |v: &Value| match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(type_error(op.as_str(), other)),
    };
    let (l, r) = (as_bool(&l)?, as_bool(&r)?);
    let result = match op {
        BinaryOp::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        _ => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(result.map(Value::Bool).unwrap_or(Value::Null))
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExecutionError> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(x), Value::Int(y)) => {
            let value = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div => x.checked_div(y),
                _ => x.checked_rem(y),
            };
            value
                .map(Value::Int)
                .ok_or_else(|| ExecutionError::Evaluation(format!("integer overflow or division by zero in {} {} {}", x, op, y)))
        }
        (Value::Int(x), Value::Float(y)) => Ok(float_op(op, x as f64, y)),
        (Value::Float(x), Value::Int(y)) => Ok(float_op(op, x, y as f64)),
        (Value::Float(x), Value::Float(y)) => Ok(float_op(op, x, y)),
        (v, _) => Err(type_error(op.as_str(), &v)),
    }
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> Value {
    Value::Float(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        _ => x % y,
    })
}

/// SQL LIKE: `%` any run, `_` one character. Case-sensitive.
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Json(v) => v.to_string(),
        other => other.to_json().to_string().trim_matches('"').to_string(),
    }
}

fn type_error(op: &str, value: &Value) -> ExecutionError {
    ExecutionError::Evaluation(format!("{} cannot be applied to {}", op, value.data_type()))
}

fn needs_database(what: &str) -> ExecutionError {
    ExecutionError::Evaluation(format!("{} needs a database to evaluate", what))
}

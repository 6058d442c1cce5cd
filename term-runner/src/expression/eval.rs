//! Evaluation of parsed assertions against a query result.

use super::parser::{BinaryOp, Expr, Literal, UnaryOp};
use crate::prelude::*;
use crate::session::QueryResult;
use datafusion::scalar::ScalarValue;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// The single name bound in an assertion's environment.
pub const RESULT_NAME: &str = "df";

/// Runtime values.
///
/// `Frame` and `Row` are handles into the bound query result; they never
/// escape as the final value of an assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Frame,
    Row(usize),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Frame => "query result",
            Value::Row(_) => "row",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Frame => f.write_str(RESULT_NAME),
            Value::Row(i) => write!(f, "{RESULT_NAME}[{i}]"),
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(scalar: ScalarValue) -> Self {
        if scalar.is_null() {
            return Value::Null;
        }
        match scalar {
            ScalarValue::Boolean(Some(b)) => Value::Bool(b),
            ScalarValue::Int8(Some(v)) => Value::Int(v.into()),
            ScalarValue::Int16(Some(v)) => Value::Int(v.into()),
            ScalarValue::Int32(Some(v)) => Value::Int(v.into()),
            ScalarValue::Int64(Some(v)) => Value::Int(v),
            ScalarValue::UInt8(Some(v)) => Value::Int(v.into()),
            ScalarValue::UInt16(Some(v)) => Value::Int(v.into()),
            ScalarValue::UInt32(Some(v)) => Value::Int(v.into()),
            ScalarValue::UInt64(Some(v)) => match i64::try_from(v) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Float(v as f64),
            },
            ScalarValue::Float32(Some(v)) => Value::Float(v.into()),
            ScalarValue::Float64(Some(v)) => Value::Float(v),
            ScalarValue::Decimal128(Some(v), _, scale) => {
                Value::Float(v as f64 / 10f64.powi(scale.into()))
            }
            ScalarValue::Utf8(Some(s))
            | ScalarValue::LargeUtf8(Some(s))
            | ScalarValue::Utf8View(Some(s)) => Value::Str(s),
            // Dates, timestamps and the rest compare by their display form.
            other => Value::Str(other.to_string()),
        }
    }
}

/// Evaluates expressions with `df` bound to one query result.
pub struct Evaluator<'a> {
    result: &'a QueryResult,
}

impl<'a> Evaluator<'a> {
    pub fn new(result: &'a QueryResult) -> Self {
        Self { result }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Name(name) if name == RESULT_NAME => Ok(Value::Frame),
            Expr::Name(name) => Err(TermError::evaluation(format!(
                "name '{name}' is not defined; only '{RESULT_NAME}' is available"
            ))),
            Expr::Unary(op, operand) => self.unary(*op, operand),
            Expr::Binary(left, op, right) => self.binary(left, *op, right),
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(target, index)
            }
            Expr::Attribute(target, name) => match self.eval(target)? {
                Value::Row(row) => self.cell(row, name),
                other => Err(TermError::evaluation(format!(
                    "{} has no attribute '{name}'",
                    other.type_name()
                ))),
            },
            Expr::Method {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.method(receiver, method, args)
            }
            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call(function, args)
            }
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value> {
        match (op, self.eval(operand)?) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Neg, Value::Int(v)) => v
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| TermError::evaluation("integer overflow in negation")),
            (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
            (op, value) => Err(TermError::evaluation(format!(
                "cannot apply {} to {}",
                match op {
                    UnaryOp::Not => "'not'",
                    UnaryOp::Neg => "'-'",
                },
                value.type_name()
            ))),
        }
    }

    fn binary(&self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<Value> {
        // Short-circuit connectives evaluate the right side lazily.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let lhs = self.expect_bool(self.eval(left)?, op)?;
            return match (op, lhs) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.expect_bool(self.eval(right)?, op)?)),
            };
        }

        let lhs = self.eval(left)?;
        let rhs = self.eval(right)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
            BinaryOp::NotEq => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = compare(&lhs, &rhs)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => arithmetic(lhs, op, rhs),
        }
    }

    fn expect_bool(&self, value: Value, op: BinaryOp) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(TermError::evaluation(format!(
                "operands of '{}' must be bool, got {}",
                if op == BinaryOp::And { "and" } else { "or" },
                other.type_name()
            ))),
        }
    }

    fn index(&self, target: Value, index: Value) -> Result<Value> {
        match (target, index) {
            (Value::Frame, Value::Int(i)) => {
                let rows = self.result.num_rows() as i64;
                let row = if i < 0 { rows + i } else { i };
                if row < 0 || row >= rows {
                    return Err(TermError::evaluation(format!(
                        "row index {i} out of range for result with {rows} rows"
                    )));
                }
                Ok(Value::Row(row as usize))
            }
            (Value::Row(row), Value::Str(column)) => self.cell(row, &column),
            (target, index) => Err(TermError::evaluation(format!(
                "cannot index {} with {}",
                target.type_name(),
                index.type_name()
            ))),
        }
    }

    fn cell(&self, row: usize, column: &str) -> Result<Value> {
        self.result.cell(row, column).map(Value::from)
    }

    fn method(&self, receiver: Value, method: &str, args: Vec<Value>) -> Result<Value> {
        if receiver != Value::Frame {
            return Err(TermError::evaluation(format!(
                "{} has no method '{method}'",
                receiver.type_name()
            )));
        }

        match (method, args.as_slice()) {
            // Spark-style `df.collect()[0]['x']` reads the same as `df[0]['x']`.
            ("collect", []) => Ok(Value::Frame),
            ("count", []) => Ok(Value::Int(self.result.num_rows() as i64)),
            ("is_empty", []) => Ok(Value::Bool(self.result.is_empty())),
            ("first", []) => self.index(Value::Frame, Value::Int(0)),
            ("sum" | "min" | "max" | "avg" | "nulls" | "distinct", [Value::Str(column)]) => {
                self.aggregate(method, column)
            }
            _ => Err(TermError::evaluation(format!(
                "unknown method '{RESULT_NAME}.{method}' with {} argument(s)",
                args.len()
            ))),
        }
    }

    fn aggregate(&self, function: &str, column: &str) -> Result<Value> {
        let scalars = self.result.column_values(column)?;
        let nulls = scalars.iter().filter(|s| s.is_null()).count();

        match function {
            "nulls" => return Ok(Value::Int(nulls as i64)),
            "distinct" => {
                let distinct: HashSet<&ScalarValue> =
                    scalars.iter().filter(|s| !s.is_null()).collect();
                return Ok(Value::Int(distinct.len() as i64));
            }
            _ => {}
        }

        let values: Vec<Value> = scalars
            .into_iter()
            .map(Value::from)
            .filter(|v| *v != Value::Null)
            .collect();

        match function {
            "sum" => values
                .into_iter()
                .try_fold(Value::Int(0), |acc, v| arithmetic(acc, BinaryOp::Add, v)),
            "avg" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let count = values.len() as f64;
                let total = values
                    .iter()
                    .map(|v| {
                        v.as_f64().ok_or_else(|| {
                            TermError::evaluation(format!(
                                "avg('{column}') needs numeric values, got {}",
                                v.type_name()
                            ))
                        })
                    })
                    .sum::<Result<f64>>()?;
                Ok(Value::Float(total / count))
            }
            _ => {
                let wanted = if function == "min" {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<Value> = None;
                for value in values {
                    best = match best {
                        Some(current) if compare(&value, &current)? != wanted => Some(current),
                        _ => Some(value),
                    };
                }
                Ok(best.unwrap_or(Value::Null))
            }
        }
    }

    fn call(&self, function: &str, args: Vec<Value>) -> Result<Value> {
        match (function, args.as_slice()) {
            ("len", [Value::Frame]) => Ok(Value::Int(self.result.num_rows() as i64)),
            ("len", [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),
            ("abs", [Value::Int(v)]) => v
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| TermError::evaluation("integer overflow in abs")),
            ("abs", [Value::Float(v)]) => Ok(Value::Float(v.abs())),
            _ => Err(TermError::evaluation(format!(
                "unknown function '{function}' for argument(s) ({})",
                args.iter()
                    .map(Value::type_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => a == b,
        },
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    ordering.ok_or_else(|| {
        TermError::evaluation(format!(
            "cannot order {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))
    })
}

fn arithmetic(lhs: Value, op: BinaryOp, rhs: Value) -> Result<Value> {
    let overflow = || TermError::evaluation("integer overflow");
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) if op != BinaryOp::Div => match op {
            BinaryOp::Add => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            _ => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
        },
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                _ if b == 0.0 => Err(TermError::evaluation("division by zero")),
                _ => Ok(Value::Float(a / b)),
            },
            _ => Err(TermError::evaluation(format!(
                "unsupported operand types for arithmetic: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ))),
        },
    }
}

//! Predicate expressions evaluated against a [`record::Record`] at the
//! scan boundary. This crate sits above `record` rather than below it, so
//! the record layer never needs to know an expression language exists.


use common::{DbError, DbResult};
use record::{Predicate, Record, Schema};
use std::cmp::Ordering;
use types::Value;

/// Binary comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operators (currently just logical NOT).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Expression abstract syntax tree.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Reference to an attribute by name, resolved against a schema at
    /// evaluation time.
    Column(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate this expression against `record`, resolving `Column`
    /// references through `schema`.
    pub fn eval_value(&self, record: &Record, schema: &Schema) -> DbResult<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column(name) => {
                let idx = schema
                    .index_of(name)
                    .ok_or_else(|| DbError::GeneralError(format!("unknown column '{name}'")))?;
                record.get_attr(schema, idx)
            }
            Expr::Unary { op, expr } => {
                let v = expr.eval_value(record, schema)?;
                match op {
                    UnaryOp::Not => {
                        let b = v
                            .as_bool()
                            .ok_or_else(|| DbError::GeneralError(format!("NOT expects bool, got {v:?}")))?;
                        Ok(Value::Bool(!b))
                    }
                }
            }
            Expr::Binary { left, op, right } => {
                let lv = left.eval_value(record, schema)?;
                let rv = right.eval_value(record, schema)?;
                eval_binary(&lv, *op, &rv)
            }
        }
    }
}

fn eval_binary(l: &Value, op: BinaryOp, r: &Value) -> DbResult<Value> {
    use BinaryOp::*;

    if matches!(op, And | Or) {
        let lb = l
            .as_bool()
            .ok_or_else(|| DbError::GeneralError(format!("AND/OR expects bools, got {l:?}")))?;
        let rb = r
            .as_bool()
            .ok_or_else(|| DbError::GeneralError(format!("AND/OR expects bools, got {r:?}")))?;
        return Ok(Value::Bool(match op {
            And => lb && rb,
            Or => lb || rb,
            _ => unreachable!(),
        }));
    }

    let ord = l
        .cmp_same_type(r)
        .ok_or_else(|| DbError::GeneralError(format!("incompatible types for {op:?}: {l:?}, {r:?}")))?;

    let result = match op {
        Eq => ord == Ordering::Equal,
        Ne => ord != Ordering::Equal,
        Lt => ord == Ordering::Less,
        Le => ord != Ordering::Greater,
        Gt => ord == Ordering::Greater,
        Ge => ord != Ordering::Less,
        _ => unreachable!(),
    };

    Ok(Value::Bool(result))
}

impl Predicate for Expr {
    fn eval(&self, record: &Record, schema: &Schema) -> DbResult<bool> {
        let v = self.eval_value(record, schema)?;
        v.as_bool()
            .ok_or_else(|| DbError::GeneralError(format!("predicate did not evaluate to bool: {v:?}")))
    }
}

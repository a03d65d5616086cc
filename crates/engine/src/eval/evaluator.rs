// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tree-walking evaluator over the restricted [`Expr`] AST (spec §4.3).
//!
//! Evaluation never mutates the context (spec §8 invariant 6) and is
//! deterministic given the same expression and context. Runtime errors
//! (attribute access on `None`, wrong arg count/type to a helper) are
//! surfaced as [`EvalError`] so the caller can apply the spec's policy of
//! "treated as `false` and logged at warn level" — this module itself
//! stays honest about failure rather than silently defaulting.

use serde_json::Value;
use thiserror::Error;

use super::ast::{ArithOp, CmpOp, Expr, PathSegment};
use super::helpers::HelperProvider;
use super::parser::{parse, ParseError};

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("unknown context root: {0}")]
    UnknownRoot(String),
    #[error("attribute access on null/missing value at path {0}")]
    NullAccess(String),
    #[error("unknown helper: {0}")]
    UnknownHelper(String),
    #[error("helper {0} called with wrong argument count/type")]
    BadHelperArgs(String),
    #[error("type error evaluating operator {0}")]
    TypeError(&'static str),
}

/// The read-only context map `{event, state, variables, settings, session,
/// task}` expressions evaluate against (spec §4.3).
pub struct EvalContext<'a> {
    pub event: &'a Value,
    pub state: &'a Value,
    pub variables: &'a Value,
    pub settings: &'a Value,
    pub session: &'a Value,
    pub task: &'a Value,
    pub helpers: &'a dyn HelperProvider,
}

impl<'a> EvalContext<'a> {
    fn root(&self, name: &str) -> Result<&'a Value, EvalError> {
        match name {
            "event" => Ok(self.event),
            "state" => Ok(self.state),
            "variables" => Ok(self.variables),
            "settings" => Ok(self.settings),
            "session" => Ok(self.session),
            "task" => Ok(self.task),
            other => Err(EvalError::UnknownRoot(other.to_string())),
        }
    }
}

/// Parse and evaluate `src` against `ctx`, returning its truthiness.
/// Callers implementing spec §4.3's "Runtime evaluation errors are treated
/// as `false`" policy should match on `Err` themselves rather than calling
/// this — it surfaces errors rather than swallowing them, so the engine can
/// log them at the point it chooses to fall back.
pub fn eval_bool(src: &str, ctx: &EvalContext) -> Result<bool, EvalError> {
    let expr = parse(src)?;
    Ok(truthy(&eval(&expr, ctx)?))
}

pub fn eval(expr: &Expr, ctx: &EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Num(n) => Ok(serde_json::json!(n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::None_ => Ok(Value::Null),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Expr::Path(root, segments) => eval_path(root, segments, ctx),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, ctx)?))),
        Expr::Neg(inner) => {
            let v = eval(inner, ctx)?;
            let n = as_number(&v).ok_or(EvalError::TypeError("unary -"))?;
            Ok(serde_json::json!(-n))
        }
        Expr::And(l, r) => {
            let lv = eval(l, ctx)?;
            if !truthy(&lv) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval(r, ctx)?)))
        }
        Expr::Or(l, r) => {
            let lv = eval(l, ctx)?;
            if truthy(&lv) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval(r, ctx)?)))
        }
        Expr::Cmp(op, l, r) => {
            let lv = eval(l, ctx)?;
            let rv = eval(r, ctx)?;
            Ok(Value::Bool(compare(*op, &lv, &rv)?))
        }
        Expr::Arith(op, l, r) => {
            let lv = eval(l, ctx)?;
            let rv = eval(r, ctx)?;
            let a = as_number(&lv).ok_or(EvalError::TypeError("arithmetic"))?;
            let b = as_number(&rv).ok_or(EvalError::TypeError("arithmetic"))?;
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
            };
            Ok(serde_json::json!(result))
        }
        Expr::In(needle, haystack) => {
            let needle = eval(needle, ctx)?;
            let haystack = eval(haystack, ctx)?;
            Ok(Value::Bool(contains(&needle, &haystack)))
        }
        Expr::Call(name, args) => eval_call(name, args, ctx).map(Value::Bool),
    }
}

fn eval_path<'a>(root: &str, segments: &[PathSegment], ctx: &EvalContext<'a>) -> Result<Value, EvalError> {
    let mut current: Value = ctx.root(root)?.clone();
    for seg in segments {
        match seg {
            PathSegment::Field(name) => {
                current = match &current {
                    Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
                    Value::Null => return Err(EvalError::NullAccess(format!("{root}.{name}"))),
                    _ => Value::Null,
                };
            }
            PathSegment::Index(idx_expr) => {
                let idx_val = eval(idx_expr, ctx)?;
                current = match (&current, as_number(&idx_val)) {
                    (Value::Array(arr), Some(n)) => {
                        let i = n as usize;
                        arr.get(i).cloned().unwrap_or(Value::Null)
                    }
                    (Value::Null, _) => return Err(EvalError::NullAccess(root.to_string())),
                    _ => Value::Null,
                };
            }
        }
    }
    Ok(current)
}

fn eval_call(name: &str, args: &[Expr], ctx: &EvalContext) -> Result<bool, EvalError> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(eval(a, ctx)?);
    }
    let as_str = |v: &Value| -> Option<String> { v.as_str().map(|s| s.to_string()) };

    match name {
        "has_previous_session" => Ok(ctx.helpers.has_previous_session()),
        "has_handoff" => Ok(ctx.helpers.has_handoff()),
        "has_stop_signal" => Ok(ctx.helpers.has_stop_signal()),
        "mcp_called" => {
            let server = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            let tool = values.get(1).and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.mcp_called(&server, &tool))
        }
        "mcp_result_is_null" => Ok(ctx.helpers.mcp_result_is_null()),
        "mcp_failed" => Ok(ctx.helpers.mcp_failed()),
        "mcp_result_has" => {
            let path = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            let value = values.get(1).cloned().unwrap_or(Value::Null);
            Ok(ctx.helpers.mcp_result_has(&path, &value))
        }
        "task_tree_complete" => {
            let root = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.task_tree_complete(&root))
        }
        "task_needs_user_review" => {
            let id = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.task_needs_user_review(&id))
        }
        "command_contains" => {
            let needle = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.command_contains(&needle))
        }
        "command_in" => {
            let list: Vec<String> = values
                .first()
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.command_in(&list))
        }
        "user_says" => {
            let word = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.user_says(&word))
        }
        "is_plan_file" => {
            let path = values.first().and_then(as_str).ok_or_else(|| EvalError::BadHelperArgs(name.into()))?;
            Ok(ctx.helpers.is_plan_file(&path))
        }
        other => ctx.helpers.custom(other, &values).ok_or_else(|| EvalError::UnknownHelper(other.to_string())),
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    let ord = if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
        a.partial_cmp(&b)
    } else if let (Some(a), Some(b)) = (l.as_str(), r.as_str()) {
        Some(a.cmp(b))
    } else {
        None
    };
    match op {
        CmpOp::Eq => Ok(l == r),
        CmpOp::NotEq => Ok(l != r),
        CmpOp::Lt => ord.map(|o| o.is_lt()).ok_or(EvalError::TypeError("<")),
        CmpOp::LtEq => ord.map(|o| o.is_le()).ok_or(EvalError::TypeError("<=")),
        CmpOp::Gt => ord.map(|o| o.is_gt()).ok_or(EvalError::TypeError(">")),
        CmpOp::GtEq => ord.map(|o| o.is_ge()).ok_or(EvalError::TypeError(">=")),
    }
}

fn contains(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        Value::Array(arr) => arr.contains(needle),
        _ => false,
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The small `{{ expr }}` templating language shared by observers' `set`
//! values and action parameter rendering (spec §4.4, §4.8). Each `{{ ... }}`
//! span is evaluated by the same expression evaluator as `when` conditions,
//! against the same context.
//!
//! A template consisting of exactly one `{{ expr }}` span (nothing else)
//! evaluates to the expression's raw JSON value — this lets
//! `set: {todo_state: "{{ event.tool_input.todos }}"}` mirror a whole array,
//! not just its string form. Any other shape is textual interpolation:
//! each span's value is stringified and spliced into the surrounding text.

use serde_json::Value;

use crate::eval::{eval_bool as _, EvalContext};

/// Render `template` against `ctx`. Evaluation errors inside a span are
/// treated as empty string / `null`, matching the evaluator's
/// "runtime errors become false/absent" policy (spec §4.3).
pub fn render(template: &str, ctx: &EvalContext) -> Value {
    if let Some(sole_expr) = as_sole_expression(template) {
        return eval_expr(sole_expr, ctx);
    }

    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let expr_src = after[..end].trim();
                let value = eval_expr(expr_src, ctx);
                out.push_str(&stringify(&value));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

fn as_sole_expression(template: &str) -> Option<&str> {
    let trimmed = template.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    Some(inner.trim())
}

fn eval_expr(src: &str, ctx: &EvalContext) -> Value {
    match crate::eval::parse(src) {
        Ok(expr) => crate::eval::eval(&expr, ctx).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::helpers::NullHelperProvider;
    use serde_json::json;

    fn ctx<'a>(event: &'a Value, helpers: &'a NullHelperProvider) -> EvalContext<'a> {
        EvalContext {
            event,
            state: &Value::Null,
            variables: &Value::Null,
            settings: &Value::Null,
            session: &Value::Null,
            task: &Value::Null,
            helpers,
        }
    }

    #[test]
    fn sole_expression_template_preserves_raw_value_shape() {
        let event = json!({"tool_input": {"todos": ["a", "b"]}});
        let helpers = NullHelperProvider;
        let c = ctx(&event, &helpers);
        let rendered = render("{{ event.tool_input.todos }}", &c);
        assert_eq!(rendered, json!(["a", "b"]));
    }

    #[test]
    fn mixed_text_and_expression_interpolates_as_string() {
        let event = json!({"tool_name": "Edit"});
        let helpers = NullHelperProvider;
        let c = ctx(&event, &helpers);
        let rendered = render("Stopping because of {{ event.tool_name }}.", &c);
        assert_eq!(rendered, json!("Stopping because of Edit."));
    }

    #[test]
    fn no_template_span_returns_literal_string() {
        let event = json!({});
        let helpers = NullHelperProvider;
        let c = ctx(&event, &helpers);
        assert_eq!(render("plain text", &c), json!("plain text"));
    }
}

//! The rule expression language for route eligibility.
//!
//! Rules are small path expressions attached to route locations:
//!
//! - `true` / `false` literal decisions
//! - `<path>.exists()` and `<path>.empty()` emptiness tests
//! - `<path> = 'literal'` equality against a quoted literal
//! - a bare `<path>`, truthy when it selects at least one value that is
//!   neither `false` nor `null`
//!
//! Anything that fails to parse as one of the structured forms falls back to
//! the bare-path reading, which evaluates false against instances lacking
//! the path.

use serde_json::Value;

use super::path::PathExpr;

/// A parsed eligibility rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    /// A literal `true` or `false`.
    Literal(bool),
    /// `<path>.exists()`.
    Exists(PathExpr),
    /// `<path>.empty()`.
    Empty(PathExpr),
    /// `<path> = 'literal'`.
    Equals(PathExpr, String),
    /// A bare path, truthy on non-empty selection.
    Truthy(PathExpr),
}

impl RuleExpr {
    /// Parses a rule expression.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed {
            "true" => return RuleExpr::Literal(true),
            "false" => return RuleExpr::Literal(false),
            _ => {}
        }
        if let Some((lhs, rhs)) = trimmed.split_once('=') {
            let rhs = rhs.trim();
            if let Some(literal) = unquote(rhs) {
                return RuleExpr::Equals(PathExpr::parse(lhs.trim()), literal.to_string());
            }
        }
        if let Some(path) = trimmed.strip_suffix(".exists()") {
            return RuleExpr::Exists(PathExpr::parse(path));
        }
        if let Some(path) = trimmed.strip_suffix(".empty()") {
            return RuleExpr::Empty(PathExpr::parse(path));
        }
        RuleExpr::Truthy(PathExpr::parse(trimmed))
    }

    /// Whether this rule is a literal boolean, decidable without an instance.
    pub fn is_literal(&self) -> bool {
        matches!(self, RuleExpr::Literal(_))
    }

    /// Evaluates the rule against an instance.
    pub fn evaluate(&self, instance: &Value) -> bool {
        match self {
            RuleExpr::Literal(decision) => *decision,
            RuleExpr::Exists(path) => !path.evaluate(instance).is_empty(),
            RuleExpr::Empty(path) => path.evaluate(instance).is_empty(),
            RuleExpr::Equals(path, literal) => path
                .evaluate(instance)
                .iter()
                .any(|value| value_matches(value, literal)),
            RuleExpr::Truthy(path) => path
                .evaluate(instance)
                .iter()
                .any(|value| !matches!(value, Value::Bool(false) | Value::Null)),
        }
    }
}

fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix('\'')?.strip_suffix('\'')
}

fn value_matches(value: &Value, literal: &str) -> bool {
    match value {
        Value::String(s) => s == literal,
        Value::Number(n) => n.to_string() == literal,
        Value::Bool(b) => b.to_string() == literal,
        _ => false,
    }
}

//! `{{dotted.path}}` template rendering over the run scope.
//!
//! Expressions are dot paths resolved against the scope's JSON form by a small
//! interpreter: object keys by name, array elements by numeric segment.
//! Missing or null values render as the empty string; strings render
//! verbatim; objects and arrays render as pretty-printed JSON.

use std::sync::LazyLock;

use cadence_types::scope::TemplateScope;
use regex::{Captures, Regex};
use serde_json::Value;

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("template expression regex is valid")
});

/// Render every `{{expr}}` in `template` against a JSON scope.
pub fn render(template: &str, scope: &Value) -> String {
    EXPRESSION
        .replace_all(template, |caps: &Captures| {
            let expr = caps[1].trim();
            let path = expr.strip_prefix('@').unwrap_or(expr);
            to_template_string(resolve_path(scope, path))
        })
        .into_owned()
}

/// Render against a [`TemplateScope`].
pub fn render_scope(template: &str, scope: &TemplateScope) -> String {
    render(template, &scope.to_value())
}

/// Walk a dot path through nested JSON. An empty path yields `root`.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// String form of a resolved value for embedding into text.
pub fn to_template_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

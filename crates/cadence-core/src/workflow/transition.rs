//! Transition resolution: first matching condition wins.
//!
//! Field conditions resolve their `field` against the current step result,
//! or against the whole scope when the path starts with `@`. Every specified
//! comparator must pass; comparisons are on the string form of both sides.

use cadence_types::workflow::{Condition, FieldCondition, Transition};
use serde_json::Value;

use super::template::{resolve_path, to_template_string};

/// Return the first transition whose condition matches, if any.
///
/// `scope` and `result` are the JSON forms of the run scope and of the step
/// result the transitions belong to.
pub fn resolve_transition<'a>(
    transitions: &'a [Transition],
    scope: &Value,
    result: &Value,
) -> Option<&'a Transition> {
    transitions
        .iter()
        .find(|t| condition_matches(&t.condition, scope, result))
}

/// Evaluate a single condition.
pub fn condition_matches(condition: &Condition, scope: &Value, result: &Value) -> bool {
    match condition {
        Condition::Always => true,
        Condition::Field(field) => field_matches(field, scope, result),
    }
}

fn field_matches(cond: &FieldCondition, scope: &Value, result: &Value) -> bool {
    let value = match cond.field.strip_prefix('@') {
        Some(path) => resolve_path(scope, path),
        None => resolve_path(result, &cond.field),
    }
    .filter(|v| !v.is_null());

    if let Some(want) = cond.exists {
        if value.is_some() != want {
            return false;
        }
    }

    if let Some(expected) = &cond.equals {
        match value {
            Some(v) if coerce(v) == coerce(expected) => {}
            _ => return false,
        }
    }

    if let Some(unexpected) = &cond.not_equals {
        if value.is_some_and(|v| coerce(v) == coerce(unexpected)) {
            return false;
        }
    }

    if let Some(needle) = &cond.includes {
        let needle = coerce(needle);
        let found = match value {
            Some(Value::Array(items)) => items.iter().any(|item| coerce(item) == needle),
            Some(v) => coerce(v).contains(&needle),
            None => false,
        };
        if !found {
            return false;
        }
    }

    true
}

fn coerce(value: &Value) -> String {
    to_template_string(Some(value))
}

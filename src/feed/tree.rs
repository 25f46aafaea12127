// src/feed/tree.rs

//! Accessor combinators over the decoded feed tree.
//!
//! A decoded field may be absent, a bare string, an object with its text under
//! [`TEXT_KEY`], or an array when the element repeats. These helpers absorb
//! that variance so the mapper reads every field the same way.

use serde_json::Value;

use super::xml::TEXT_KEY;

/// Stand-in for an absent node.
pub static NULL: Value = Value::Null;

/// First element of an array, or the value itself.
fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// Coerce an optional node into a list of nodes.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Walk object keys, stepping into the first element of any array met on the way.
pub fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .try_fold(value, |node, key| first(node).and_then(|n| n.get(*key)))
}

/// Unwrap the text of a node. Empty text counts as absent.
pub fn text(value: Option<&Value>) -> Option<String> {
    match first(value?)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => text(map.get(TEXT_KEY)),
        Value::Array(_) | Value::Null => None,
    }
}

/// Text at a key path.
pub fn text_at(value: &Value, keys: &[&str]) -> Option<String> {
    text(path(value, keys))
}

/// Attribute value of a node.
pub fn attr(value: &Value, name: &str) -> Option<String> {
    match first(value)? {
        Value::Object(map) => text(map.get(name)),
        _ => None,
    }
}

/// Among `items`, the `child` node whose `attr_name` attribute equals `wanted`.
///
/// First match wins.
pub fn find_by_attr<'a>(
    items: &[&'a Value],
    child: &str,
    attr_name: &str,
    wanted: &str,
) -> Option<&'a Value> {
    items
        .iter()
        .filter_map(|item| path(item, &[child]))
        .find(|node| attr(node, attr_name).as_deref() == Some(wanted))
}

/// Leading unsigned integer of a node's text (`"08"` and `"8.0"` give 8).
pub fn int(value: Option<&Value>) -> Option<u32> {
    let raw = text(value)?;
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Integer at a key path.
pub fn int_at(value: &Value, keys: &[&str]) -> Option<u32> {
    int(path(value, keys))
}

/// Monetary amount of a node's text, accepting a decimal comma.
pub fn amount(value: Option<&Value>) -> Option<f64> {
    parse_amount(&text(value)?)
}

/// Amount at a key path.
pub fn amount_at(value: &Value, keys: &[&str]) -> Option<f64> {
    amount(path(value, keys))
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

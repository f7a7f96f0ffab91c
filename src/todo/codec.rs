//! Encoding and decoding of the todo list document.

use super::Todo;
use crate::error::CodecError;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex is valid"));

/// Encode a todo list as a pretty-printed JSON array.
pub fn encode(todos: &[Todo]) -> Result<String, CodecError> {
    let mut out = serde_json::to_string_pretty(todos).map_err(CodecError::Malformed)?;
    out.push('\n');
    Ok(out)
}

/// Decode a todo list document.
///
/// Returns `CodecError::Malformed` for invalid JSON and
/// `CodecError::WrongShape` for anything that is not an array of valid todos,
/// including duplicate ids.
pub fn decode(bytes: &[u8]) -> Result<Vec<Todo>, CodecError> {
    let raw: Value = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;

    let items = match raw {
        Value::Array(items) => items,
        other => {
            return Err(CodecError::WrongShape(format!(
                "todo store must be a JSON array, found {}",
                kind_of(&other)
            )));
        }
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut todos = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let todo = decode_item(index, item)?;
        if !seen.insert(todo.id) {
            return Err(CodecError::WrongShape(format!(
                "duplicate todo id {} at index {}",
                todo.id, index
            )));
        }
        todos.push(todo);
    }
    Ok(todos)
}

fn decode_item(index: usize, item: &Value) -> Result<Todo, CodecError> {
    let obj = item.as_object().ok_or_else(|| {
        shape(
            index,
            format!("expected an object, found {}", kind_of(item)),
        )
    })?;

    let id = decode_id(index, obj)?;

    let text = match obj.get("text") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => {
            return Err(shape(
                index,
                format!("'text' must be a string, found {}", kind_of(other)),
            ));
        }
        None => return Err(shape(index, "missing required field 'text'")),
    };

    let done = match obj.get("done") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(done)) => *done,
        Some(Value::Number(n)) if n.as_u64() == Some(0) => false,
        Some(Value::Number(n)) if n.as_u64() == Some(1) => true,
        Some(other) => {
            return Err(shape(
                index,
                format!("'done' must be true/false or 0/1, found {}", other),
            ));
        }
    };

    let due_date = match obj.get("due_date") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(parse_due_date(s).map_err(|msg| shape(index, msg))?),
        Some(other) => {
            return Err(shape(
                index,
                format!("'due_date' must be a string, found {}", kind_of(other)),
            ));
        }
    };

    let created_at = decode_timestamp(index, obj, "created_at")?;
    let updated_at = decode_timestamp(index, obj, "updated_at")?;
    let now = Utc::now();
    let created_at = created_at.unwrap_or(now);
    let updated_at = updated_at.unwrap_or(created_at);

    Ok(Todo {
        id,
        text,
        done,
        due_date,
        created_at,
        updated_at,
    })
}

fn decode_id(index: usize, obj: &Map<String, Value>) -> Result<u64, CodecError> {
    match obj.get("id") {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            shape(
                index,
                format!("'id' must be a non-negative integer, found {}", n),
            )
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| {
            shape(
                index,
                format!("'id' must be a non-negative integer, found {:?}", s),
            )
        }),
        Some(other) => Err(shape(
            index,
            format!("'id' must be an integer, found {}", kind_of(other)),
        )),
        None => Err(shape(index, "missing required field 'id'")),
    }
}

fn decode_timestamp(
    index: usize,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, CodecError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| {
                shape(
                    index,
                    format!("'{}' is not an RFC 3339 timestamp ({:?}): {}", field, s, e),
                )
            }),
        Some(other) => Err(shape(
            index,
            format!("'{}' must be a string, found {}", field, kind_of(other)),
        )),
    }
}

/// Parse a strict `YYYY-MM-DD` date.
pub(crate) fn parse_due_date(s: &str) -> Result<NaiveDate, String> {
    if !ISO_DATE.is_match(s) {
        return Err(format!("invalid date format {:?}, expected YYYY-MM-DD", s));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date {:?}", s))
}

fn shape(index: usize, message: impl AsRef<str>) -> CodecError {
    CodecError::WrongShape(format!("todo at index {}: {}", index, message.as_ref()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

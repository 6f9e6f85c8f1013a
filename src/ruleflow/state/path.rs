// SPDX-License-Identifier: MIT

//! jq-style paths over JSON values.
//!
//! Supported syntax: `.a.b`, `.items[0]`, `.items[-1]`, `.items[]`,
//! `.items[].name` and `.["odd key"]`. The leading dot is optional and `.`
//! alone is the identity.

use serde_json::{Map, Value};

use crate::engine::error::{EngineError, Result};

/// How far past the end of an array a write may pad with nulls
pub const MAX_INDEX_GAP: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String),
    Index(i64),
    /// `[]`: every element of an array (or value of an object)
    Iterate,
}

fn path_error(path: &str, message: impl Into<String>) -> EngineError {
    EngineError::node("path", format!("'{}': {}", path, message.into()))
}

pub fn parse(path: &str) -> Result<Vec<Segment>> {
    let chars: Vec<char> = path.trim().chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| path_error(path, "unclosed '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                if inner.is_empty() {
                    segments.push(Segment::Iterate);
                } else if let Some(quoted) = inner
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                {
                    segments.push(Segment::Key(quoted.to_string()));
                } else {
                    let index = inner
                        .parse::<i64>()
                        .map_err(|_| path_error(path, format!("bad index '{inner}'")))?;
                    segments.push(Segment::Index(index));
                }
                i = close + 1;
            }
            c if c.is_whitespace() => {
                return Err(path_error(path, "unexpected whitespace"));
            }
            _ => {
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                segments.push(Segment::Key(key));
            }
        }
    }

    Ok(segments)
}

/// Read the value at `segments`; missing keys read as null
pub fn get(value: &Value, segments: &[Segment]) -> Result<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(value.clone());
    };

    match head {
        Segment::Key(key) => match value {
            Value::Object(map) => get(map.get(key).unwrap_or(&Value::Null), rest),
            Value::Null => get(&Value::Null, rest),
            other => Err(EngineError::node(
                "path",
                format!("cannot index {} with '{}'", type_name(other), key),
            )),
        },
        Segment::Index(index) => match value {
            Value::Array(items) => match resolve_index(*index, items.len()) {
                Some(i) => get(&items[i], rest),
                None => get(&Value::Null, rest),
            },
            Value::Null => get(&Value::Null, rest),
            other => Err(EngineError::node(
                "path",
                format!("cannot index {} with {}", type_name(other), index),
            )),
        },
        Segment::Iterate => {
            let items: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::Object(map) => map.values().collect(),
                Value::Null => Vec::new(),
                other => {
                    return Err(EngineError::node(
                        "path",
                        format!("cannot iterate over {}", type_name(other)),
                    ))
                }
            };
            items
                .into_iter()
                .map(|item| get(item, rest))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
    }
}

/// Write `new` at `segments`, creating intermediate objects and arrays
pub fn set(target: &mut Value, segments: &[Segment], new: Value) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *target = new;
        return Ok(());
    };

    match head {
        Segment::Key(key) => {
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
            let map = target.as_object_mut().ok_or_else(|| {
                EngineError::node("path", format!("cannot set key '{key}' on non-object"))
            })?;
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            set(slot, rest, new)
        }
        Segment::Index(index) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            let items = target.as_array_mut().ok_or_else(|| {
                EngineError::node("path", format!("cannot set index {index} on non-array"))
            })?;
            let i = if *index < 0 {
                resolve_index(*index, items.len()).ok_or_else(|| {
                    EngineError::node("path", format!("index {index} out of range"))
                })?
            } else {
                *index as usize
            };
            if i > items.len().saturating_add(MAX_INDEX_GAP) {
                return Err(EngineError::node(
                    "path",
                    format!("index {index} is too far past the end of an array of {}", items.len()),
                ));
            }
            if items.len() <= i {
                items.resize(i + 1, Value::Null);
            }
            set(&mut items[i], rest, new)
        }
        Segment::Iterate => Err(EngineError::node("path", "'[]' cannot be used in a write")),
    }
}

/// Parse and read in one step
pub fn query(value: &Value, path: &str) -> Result<Value> {
    get(value, &parse(path)?)
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_segments() {
        assert_eq!(parse(".").unwrap(), vec![]);
        assert_eq!(
            parse(".a.b[0]").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(0)
            ]
        );
        assert_eq!(
            parse(r#"items[].["odd key"]"#).unwrap(),
            vec![
                Segment::Key("items".into()),
                Segment::Iterate,
                Segment::Key("odd key".into())
            ]
        );
        assert!(parse(".a[").is_err());
        assert!(parse(".a[x]").is_err());
    }

    #[test]
    fn test_get() {
        let doc = json!({"user": {"tags": ["a", "b"]}, "items": [{"id": 1}, {"id": 2}]});
        assert_eq!(query(&doc, ".user.tags[1]").unwrap(), json!("b"));
        assert_eq!(query(&doc, ".user.tags[-1]").unwrap(), json!("b"));
        assert_eq!(query(&doc, ".items[].id").unwrap(), json!([1, 2]));
        assert_eq!(query(&doc, ".missing.deeper").unwrap(), Value::Null);
        assert_eq!(query(&doc, ".user.tags[9]").unwrap(), Value::Null);
        assert_eq!(query(&doc, ".").unwrap(), doc);
        assert!(query(&doc, ".user.tags.name").is_err());
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = Value::Null;
        set(&mut doc, &parse(".a.b").unwrap(), json!(1)).unwrap();
        set(&mut doc, &parse(".list[2]").unwrap(), json!("x")).unwrap();
        assert_eq!(doc, json!({"a": {"b": 1}, "list": [null, null, "x"]}));

        set(&mut doc, &parse(".list[-1]").unwrap(), json!("y")).unwrap();
        assert_eq!(doc["list"][2], json!("y"));
    }

    #[test]
    fn test_set_rejects_iterate_and_type_conflicts() {
        let mut doc = json!({"a": 1});
        assert!(set(&mut doc, &parse(".a.b").unwrap(), json!(2)).is_err());
        assert!(set(&mut doc, &parse(".x[]").unwrap(), json!(2)).is_err());
    }

    #[test]
    fn test_set_rejects_far_out_of_range_index() {
        let mut doc = json!({"a": [1]});
        let err = set(&mut doc, &parse(".a[9000000000000]").unwrap(), json!(2)).unwrap_err();
        assert!(err.to_string().contains("too far past the end"), "{err}");
        assert_eq!(doc, json!({"a": [1]}));

        let edge = format!(".b[{MAX_INDEX_GAP}]");
        set(&mut doc, &parse(&edge).unwrap(), json!(true)).unwrap();
        assert_eq!(doc["b"].as_array().map(Vec::len), Some(MAX_INDEX_GAP + 1));
    }
}

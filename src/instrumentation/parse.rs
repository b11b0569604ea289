use crate::error::{HarnessError, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// Read a manifest document from disk.
///
/// JSON is tried first. When the text is not JSON at all, flat `key=value`
/// lines are accepted instead; a JSON document whose root is not an object is
/// rejected outright.
pub fn load_manifest(path: &Path) -> Result<Map<String, Value>> {
    let bytes = std::fs::read(path).map_err(|err| HarnessError::ManifestParse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let text = String::from_utf8_lossy(&bytes);

    parse_manifest(&text).map_err(|reason| HarnessError::ManifestParse {
        path: path.to_path_buf(),
        reason,
    })
}

pub fn parse_manifest(text: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("manifest root must be an object".to_string()),
        Err(json_err) => {
            let flat = parse_flat(text);
            if flat.is_empty() {
                Err(json_err.to_string())
            } else {
                Ok(flat)
            }
        }
    }
}

/// Parse `key=value` lines. Blank lines and `#`/`;` comments are skipped,
/// dotted keys nest, and `true`/`false`/integers are typed.
pub fn parse_flat(text: &str) -> Map<String, Value> {
    let mut root = Map::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        insert_dotted(&mut root, key, scalar(value.trim()));
    }

    root
}

fn insert_dotted(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments: Vec<&str> = key.split('.').map(str::trim).collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut node = root;
    for segment in segments {
        let slot = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            // A scalar set earlier under this prefix is replaced by the nested form.
            *slot = Value::Object(Map::new());
        }
        node = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
    node.insert(last.to_string(), value);
}

fn scalar(raw: &str) -> Value {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => return Value::Bool(true),
        "false" | "no" | "off" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(number) = raw.parse::<i64>() {
        return Value::from(number);
    }
    Value::String(raw.to_string())
}

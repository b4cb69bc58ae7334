//! Field encoding and the indented field block.

use crate::format::{quote, quote_key};
use crate::record::Field;
use serde_json::{Map, Value};

const INDENT: &str = "  ";

/// Encode ordered fields into a map value.
///
/// Order is preserved. A repeated key keeps the position of its first
/// occurrence and the value of its last.
pub fn encode(fields: &[Field]) -> Value {
    let mut map = Map::with_capacity(fields.len());
    for field in fields {
        map.insert(field.key.clone(), field.value.clone());
    }
    Value::Object(map)
}

/// Render a map one key per line, nesting containers at increasing
/// indentation. The top level is not indented and there is no trailing
/// newline.
pub fn render(map: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_map(&mut out, map, 0);
    out
}

fn write_map(out: &mut String, map: &Map<String, Value>, depth: usize) {
    for (key, value) in map {
        start_line(out, depth);
        out.push_str(&quote_key(key));
        out.push(':');
        write_value(out, value, depth);
    }
}

// Called right after a `key:` or `-` marker.
fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Object(map) if !map.is_empty() => write_map(out, map, depth + 1),
        Value::Array(items) if !items.is_empty() => {
            for item in items {
                start_line(out, depth + 1);
                out.push('-');
                write_value(out, item, depth + 1);
            }
        }
        scalar => {
            out.push(' ');
            out.push_str(&render_scalar(scalar));
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        other => other.to_string(),
    }
}

fn start_line(out: &mut String, depth: usize) {
    if !out.is_empty() {
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

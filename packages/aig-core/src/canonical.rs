//! Canonical Encoder (component A).
//!
//! Deterministic byte serialization of any `serde_json::Value`, used
//! everywhere a structured value is hashed, signed, or compared for
//! equality: changeset `patches`, the integrity payload, and sub-element
//! `metadata`. Two semantically-equal values always yield byte-identical
//! output.
//!
//! Object keys are sorted by `String`'s default `Ord` (byte-wise over UTF-8),
//! which agrees with code-point order. Arrays preserve input order. Numbers
//! are rendered through `serde_json::Number`'s own `Display`, which already
//! produces the shortest round-tripping form. Strings are escaped via
//! `serde_json::to_string`, reusing `serde_json`'s escaping instead of
//! reimplementing it.

use serde_json::Value;

/// Serialize `value` to its canonical byte form.
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_canonical(value, &mut buf);
    buf
}

/// Serialize `value` to its canonical form as a UTF-8 string.
///
/// The canonical encoding is always valid UTF-8 JSON, so this never fails.
pub fn to_canonical_string(value: &Value) -> String {
    // Safety of the expect: write_canonical only ever appends bytes produced
    // by serde_json's own string serializer and ASCII literals.
    String::from_utf8(to_canonical_bytes(value)).expect("canonical output is always valid utf-8")
}

/// Compare two optional structured values for canonical equality, treating
/// `None` the same as `Value::Null`.
pub fn canonical_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.cloned().unwrap_or(Value::Null);
    let b = b.cloned().unwrap_or(Value::Null);
    to_canonical_bytes(&a) == to_canonical_bytes(&b)
}

fn write_canonical(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_json_string(s, buf),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_canonical(item, buf);
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            buf.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_json_string(key, buf);
                buf.push(b':');
                // Present because the key came from map.keys().
                write_canonical(&map[*key], buf);
            }
            buf.push(b'}');
        }
    }
}

fn write_json_string(s: &str, buf: &mut Vec<u8>) {
    let encoded = serde_json::to_string(s).expect("string serialization is infallible");
    buf.extend_from_slice(encoded.as_bytes());
}

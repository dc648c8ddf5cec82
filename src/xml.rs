//! Structured value to XML conversion.
//!
//! The classic Jamf API only accepts XML bodies. Desired state is assembled as a
//! [`serde_json::Value`] (with insertion order preserved) and rendered here, one
//! element per mapping key, two spaces of indentation per nesting level.

use crate::error::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::Serialize;
use serde_json::{Map, Value};

const INDENT: &str = "  ";

/// Serialize any value which converts into a mapping.
pub fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    let value =
        serde_json::to_value(value).map_err(|err| Error::unsupported_shape("", err.to_string()))?;
    serialize(&value)
}

/// Render a mapping as an XML fragment.
///
/// `null` values are skipped, so optional fields never produce empty tags. A
/// sequence renders one element per item, repeating the key. Sequences nested
/// directly inside sequences are rejected.
pub fn serialize(value: &Value) -> Result<String> {
    match value {
        Value::Object(map) => map_to_xml(map, "", ""),
        other => Err(Error::unsupported_shape(
            "",
            format!("document root must be a mapping, got {}", kind(other)),
        )),
    }
}

/// Re-parse a document and re-indent it, for readable debug output.
pub fn pretty(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => writer
                .write_event(event)
                .map_err(|err| Error::Xml(err.to_string()))?,
            Err(err) => return Err(Error::Xml(err.to_string())),
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|err| Error::Xml(err.to_string()))
}

fn map_to_xml(map: &Map<String, Value>, indent: &str, path: &str) -> Result<String> {
    let child_indent = format!("{indent}{INDENT}");
    let mut out = String::new();

    for (key, value) in map {
        let key_path = join(path, key);
        if !value.is_null() {
            check_name(key, &key_path)?;
        }

        match value {
            Value::Null => {}
            Value::Object(inner) => {
                let xml = map_to_xml(inner, &child_indent, &key_path)?;
                element(&mut out, key, &xml, indent);
            }
            Value::Array(items) => {
                let xml = seq_to_xml(items, key, indent, &key_path)?;
                if !xml.is_empty() {
                    out.push_str(&xml);
                    out.push('\n');
                }
            }
            primitive => out.push_str(&primitive_to_xml(key, primitive, indent)),
        }
    }

    Ok(out.trim_end().to_string())
}

fn seq_to_xml(items: &[Value], key: &str, indent: &str, path: &str) -> Result<String> {
    let child_indent = format!("{indent}{INDENT}");
    let mut out = String::new();

    for item in items {
        match item {
            Value::Null => {}
            Value::Object(inner) => {
                let xml = map_to_xml(inner, &child_indent, path)?;
                element(&mut out, key, &xml, indent);
            }
            Value::Array(_) => {
                return Err(Error::unsupported_shape(
                    path,
                    "nested sequences are not supported, flatten them first",
                ))
            }
            primitive => out.push_str(&primitive_to_xml(key, primitive, indent)),
        }
    }

    Ok(out.trim_end().to_string())
}

fn element(out: &mut String, key: &str, inner: &str, indent: &str) {
    if inner.is_empty() {
        out.push_str(&format!("{indent}<{key}>\n{indent}</{key}>\n"));
    } else {
        out.push_str(&format!("{indent}<{key}>\n{inner}\n{indent}</{key}>\n"));
    }
}

fn primitive_to_xml(key: &str, value: &Value, indent: &str) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("{indent}<{key}>{}</{key}>\n", escape(text.as_str()))
}

fn check_name(key: &str, path: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));

    if valid {
        Ok(())
    } else {
        Err(Error::unsupported_shape(path, "key is not a valid element name"))
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

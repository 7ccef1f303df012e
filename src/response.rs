//! Turning raw provider text into a panel label and caption.
//!
//! Deformatting ([`strip_decoration`]) and field extraction
//! ([`parse_description`]) are kept apart so cached raw responses can be
//! re-parsed after either step changes.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDescription {
    pub panel_label: Option<String>,
    pub panel_caption: Option<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("response JSON is a {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Removes code fences and any prose around the outermost JSON object.
pub fn strip_decoration(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    let text = text.trim();

    if text.starts_with('{') && text.ends_with('}') {
        return text;
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

pub fn parse_description(normalized: &str) -> Result<ParsedDescription, ParseError> {
    let fields = match serde_json::from_str::<Value>(normalized)? {
        Value::Object(fields) => fields,
        other => return Err(ParseError::NotAnObject(json_kind(&other))),
    };

    Ok(ParsedDescription {
        panel_label: fields.get("panel_label").and_then(label_text),
        panel_caption: fields
            .get("panel_caption")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

pub fn parse_raw_response(raw: &str) -> Result<ParsedDescription, ParseError> {
    parse_description(strip_decoration(raw))
}

fn label_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

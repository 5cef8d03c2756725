//! Cell value coercion.
//!
//! Turns one raw CSV cell into a typed [`Value`]. Resolution order:
//!
//! 1. Quoted cell (`"123"`) - always a String, quotes removed
//! 2. Value prefix (`int: 123`) - parsed as the prefix type, column hint ignored
//! 3. Column hint (`age:int` header) - whole cell parsed as the hinted type
//! 4. Auto-detection - null, boolean, integer, float, ISO-8601 timestamp, string
//!
//! Coercion never fails: a cell that cannot be parsed as its requested type
//! degrades to a String and a warning is emitted.

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{ConversionError, RowIssue};
use crate::models::{Cell, GeoPoint, TypeTag, Value};

type Parser = fn(&str) -> Result<Value, ConversionError>;

/// Recognised type tokens, usable as `token:` value prefixes and `:token` column hints.
pub const TYPE_PREFIXES: &[(&str, TypeTag)] = &[
    ("null", TypeTag::Null),
    ("none", TypeTag::Null),
    ("bool", TypeTag::Boolean),
    ("boolean", TypeTag::Boolean),
    ("int", TypeTag::Integer),
    ("integer", TypeTag::Integer),
    ("float", TypeTag::Float),
    ("double", TypeTag::Float),
    ("str", TypeTag::String),
    ("string", TypeTag::String),
    ("text", TypeTag::String),
    ("timestamp", TypeTag::Timestamp),
    ("datetime", TypeTag::Timestamp),
    ("date", TypeTag::Timestamp),
    ("geopoint", TypeTag::GeoPoint),
    ("geo", TypeTag::GeoPoint),
    ("location", TypeTag::GeoPoint),
    ("array", TypeTag::Array),
    ("list", TypeTag::Array),
    ("map", TypeTag::Map),
    ("dict", TypeTag::Map),
    ("object", TypeTag::Map),
    ("bytes", TypeTag::Bytes),
    ("ref", TypeTag::Reference),
    ("reference", TypeTag::Reference),
];

static PREFIX_TABLE: Lazy<HashMap<&'static str, TypeTag>> =
    Lazy::new(|| TYPE_PREFIXES.iter().copied().collect());

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").unwrap());

static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[-+]?(?:(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?|[0-9]+[eE][-+]?[0-9]+)$",
    )
    .unwrap()
});

const TRUE_WORDS: &[&str] = &["true", "1", "yes", "y"];
const FALSE_WORDS: &[&str] = &["false", "0", "no", "n"];

/// Look up a type token (case-insensitive, surrounding whitespace ignored).
pub fn lookup_type(token: &str) -> Option<TypeTag> {
    PREFIX_TABLE.get(token.trim().to_lowercase().as_str()).copied()
}

fn parser_for(tag: TypeTag) -> Parser {
    match tag {
        TypeTag::Null => parse_null,
        TypeTag::Boolean => parse_boolean,
        TypeTag::Integer => parse_integer,
        TypeTag::Float => parse_float,
        TypeTag::String => parse_string,
        TypeTag::Timestamp => parse_timestamp,
        TypeTag::GeoPoint => parse_geopoint,
        TypeTag::Array => parse_array,
        TypeTag::Map => parse_map,
        TypeTag::Bytes => parse_bytes,
        TypeTag::Reference => parse_reference,
    }
}

/// Outcome of coercing one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: Value,
    /// Set when the requested type could not be honoured and `value` fell back to a String.
    pub error: Option<ConversionError>,
}

impl Coerced {
    fn ok(value: Value) -> Self {
        Self { value, error: None }
    }
}

/// Coerce a raw cell, logging a warning if it had to degrade to a String.
pub fn coerce(raw: &str, hint: Option<TypeTag>) -> Value {
    let coerced = coerce_detailed(raw, hint);
    if let Some(ref error) = coerced.error {
        warn!("{}, keeping it as a string", error);
    }
    coerced.value
}

/// Coerce a raw cell and report any degradation instead of logging it.
pub fn coerce_detailed(raw: &str, hint: Option<TypeTag>) -> Coerced {
    let value = raw.trim();

    if value.is_empty() {
        return Coerced::ok(match hint {
            Some(TypeTag::String) => Value::String(String::new()),
            _ => Value::Null,
        });
    }

    if is_quoted(value) {
        return Coerced::ok(Value::string(&value[1..value.len() - 1]));
    }

    if let Some((tag, content)) = split_prefix(value) {
        return convert(tag, content);
    }

    if let Some(tag) = hint {
        return convert(tag, value);
    }

    Coerced::ok(auto_detect(value))
}

/// Coerce a row cell with its column hint, recording a degradation against the row's line.
pub fn coerce_cell(line: usize, cell: &Cell, issues: &mut Vec<RowIssue>) -> Value {
    let coerced = coerce_detailed(&cell.raw, cell.column.hint);
    if let Some(error) = coerced.error {
        let issue = RowIssue::Conversion {
            line,
            column: cell.column.name.clone(),
            error,
        };
        warn!("{}, keeping it as a string", issue);
        issues.push(issue);
    }
    coerced.value
}

/// Whether a cell is wrapped in double quotes.
pub fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}

/// Split `"int: 42"` into `(Integer, "42")`. Unknown prefixes are not prefixes.
fn split_prefix(value: &str) -> Option<(TypeTag, &str)> {
    let (prefix, content) = value.split_once(':')?;
    let tag = lookup_type(prefix)?;
    Some((tag, content.trim()))
}

fn convert(tag: TypeTag, content: &str) -> Coerced {
    match parser_for(tag)(content) {
        Ok(value) => Coerced::ok(value),
        Err(error) => Coerced {
            value: Value::string(content),
            error: Some(error),
        },
    }
}

/// Infer a type from the cell text alone. First match wins.
pub fn auto_detect(value: &str) -> Value {
    let lower = value.to_lowercase();

    if lower == "null" || lower == "none" {
        return Value::Null;
    }

    match lower.as_str() {
        "true" | "yes" | "y" => return Value::Boolean(true),
        "false" | "no" | "n" => return Value::Boolean(false),
        _ => {}
    }

    if INTEGER_RE.is_match(value) {
        // Out of i64 range: leave the digits untouched.
        return value
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::string(value));
    }

    if FLOAT_RE.is_match(value) {
        if let Some(n) = value.parse::<f64>().ok().filter(|n| n.is_finite()) {
            return Value::Float(n);
        }
    }

    if looks_like_datetime(value) {
        if let Some(ts) = parse_iso_datetime(value) {
            return Value::Timestamp(ts);
        }
    }

    Value::string(value)
}

fn looks_like_datetime(value: &str) -> bool {
    value.contains('T') || value.matches('-').count() >= 2
}

// =============================================================================
// Per-type parsers
// =============================================================================

fn parse_null(_: &str) -> Result<Value, ConversionError> {
    Ok(Value::Null)
}

fn parse_boolean(content: &str) -> Result<Value, ConversionError> {
    let lower = content.to_lowercase();
    if TRUE_WORDS.contains(&lower.as_str()) {
        Ok(Value::Boolean(true))
    } else if FALSE_WORDS.contains(&lower.as_str()) {
        Ok(Value::Boolean(false))
    } else {
        Err(ConversionError::invalid(content, TypeTag::Boolean))
    }
}

fn parse_integer(content: &str) -> Result<Value, ConversionError> {
    content
        .parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| ConversionError::invalid(content, TypeTag::Integer))
}

fn parse_float(content: &str) -> Result<Value, ConversionError> {
    // Non-finite floats have no JSON rendering.
    match content.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Value::Float(n)),
        _ => Err(ConversionError::invalid(content, TypeTag::Float)),
    }
}

fn parse_string(content: &str) -> Result<Value, ConversionError> {
    Ok(Value::string(content))
}

fn parse_timestamp(content: &str) -> Result<Value, ConversionError> {
    parse_iso_datetime(content)
        .or_else(|| parse_slashed_datetime(content))
        .map(Value::Timestamp)
        .ok_or_else(|| ConversionError::invalid(content, TypeTag::Timestamp))
}

fn parse_geopoint(content: &str) -> Result<Value, ConversionError> {
    let parts: Vec<&str> = content.split(',').collect();
    if parts.len() != 2 {
        return Err(ConversionError::geopoint(content, "expected 'lat,lng'"));
    }

    let mut coords = [0.0_f64; 2];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<f64>()
            .map_err(|e| ConversionError::geopoint(content, e.to_string()))?;
    }

    GeoPoint::new(coords[0], coords[1])
        .map(Value::GeoPoint)
        .ok_or_else(|| ConversionError::geopoint(content, "coordinates out of range"))
}

fn parse_array(content: &str) -> Result<Value, ConversionError> {
    let json: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ConversionError::malformed(content, TypeTag::Array, e))?;
    if !json.is_array() {
        return Err(ConversionError::malformed(content, TypeTag::Array, "expected a JSON array"));
    }
    Ok(Value::from_json(json))
}

fn parse_map(content: &str) -> Result<Value, ConversionError> {
    let json: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ConversionError::malformed(content, TypeTag::Map, e))?;
    if !json.is_object() {
        return Err(ConversionError::malformed(content, TypeTag::Map, "expected a JSON object"));
    }
    Ok(Value::from_json(json))
}

fn parse_bytes(content: &str) -> Result<Value, ConversionError> {
    base64::engine::general_purpose::STANDARD
        .decode(content)
        .map(Value::Bytes)
        .map_err(|e| ConversionError::malformed(content, TypeTag::Bytes, e))
}

fn parse_reference(content: &str) -> Result<Value, ConversionError> {
    debug!("reference '{}' kept as a path; resolving it is up to the store", content);
    Ok(Value::Reference(content.to_string()))
}

// =============================================================================
// Date/time helpers
// =============================================================================

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// ISO-8601 date or date-time. Values without an offset are taken as UTC.
pub fn parse_iso_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let zulu = value.strip_suffix('Z').map(|v| format!("{}+00:00", v));
    let candidate = zulu.as_deref().unwrap_or(value);

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_slashed_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y/%m/%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y/%m/%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.and_utc())
}

/// Human-readable table of the type tokens, for the CLI.
pub fn prefixes_description() -> String {
    let mut out = String::from("Type prefixes (value `token: content`) and column hints (header `name:token`):\n\n");
    let mut tags: Vec<TypeTag> = Vec::new();
    for (_, tag) in TYPE_PREFIXES {
        if !tags.contains(tag) {
            tags.push(*tag);
        }
    }
    for tag in tags {
        let tokens: Vec<&str> = TYPE_PREFIXES
            .iter()
            .filter(|(_, t)| *t == tag)
            .map(|(token, _)| *token)
            .collect();
        out.push_str(&format!("  {:<10} {}\n", tag.as_str(), tokens.join(", ")));
    }
    out.push_str(
        "\nGeoPoint content is 'lat,lng'; array/map content is JSON; bytes content is base64.\n\
         Wrap a cell in double quotes to force a string.\n",
    );
    out
}

//! Coercion of string-typed API fields into semantic types.
//!
//! Ubersmith encodes integers, amounts, flags and dates as strings. A
//! [`Cleaner`] describes, per call, which fields to turn into what. The free
//! functions here do the individual conversions and can be used on their own.

use crate::{value::Map, Error, Result, Value};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use rust_decimal::Decimal;
use std::str::FromStr;

fn coercion_error(field: &str, value: &Value, expected: &'static str) -> Error {
    Error::Coercion {
        field: field.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Coerces a value to an integer. Empty strings become [`Value::Null`].
///
/// # Examples
///
/// ```
/// use ubersmith::{coerce, Value};
///
/// assert_eq!(coerce::to_int("clientid", &Value::from("50")).unwrap(), Value::Int(50));
/// assert_eq!(coerce::to_int("clientid", &Value::from("")).unwrap(), Value::Null);
/// assert!(coerce::to_int("clientid", &Value::from("fifty")).is_err());
/// ```
pub fn to_int(field: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Null | Value::Int(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            s.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| coercion_error(field, value, "int"))
        }
        _ => Err(coercion_error(field, value, "int")),
    }
}

/// Coerces a value to an exact decimal. Empty strings become [`Value::Null`].
pub fn to_decimal(field: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Null | Value::Decimal(_) => Ok(value.clone()),
        Value::Int(n) => Ok(Value::Decimal(Decimal::from(*n))),
        Value::Float(f) => Decimal::try_from(*f)
            .map(Value::Decimal)
            .map_err(|_| coercion_error(field, value, "decimal")),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            Decimal::from_str(s)
                .map(Value::Decimal)
                .map_err(|_| coercion_error(field, value, "decimal"))
        }
        _ => Err(coercion_error(field, value, "decimal")),
    }
}

/// Coerces a value to a boolean.
///
/// Accepts numbers (zero is false) and the strings `1`, `0`, `true`, `false`,
/// `yes`, `no`, `on`, `off` in any case. The empty string is false.
pub fn to_bool(field: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Null | Value::Bool(_) => Ok(value.clone()),
        Value::Int(n) => Ok(Value::Bool(*n != 0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(coercion_error(field, value, "bool")),
        },
        _ => Err(coercion_error(field, value, "bool")),
    }
}

/// Coerces seconds since the Unix epoch into a UTC timestamp.
///
/// Fractional seconds are kept. Empty strings become [`Value::Null`].
pub fn to_timestamp(field: &str, value: &Value) -> Result<Value> {
    let seconds = match value {
        Value::Null | Value::Timestamp(_) => return Ok(value.clone()),
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            s.parse::<f64>()
                .map_err(|_| coercion_error(field, value, "timestamp"))?
        }
        _ => return Err(coercion_error(field, value, "timestamp")),
    };
    timestamp_from_seconds(seconds)
        .map(Value::Timestamp)
        .ok_or_else(|| coercion_error(field, value, "timestamp"))
}

fn timestamp_from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// A declarative description of how to clean a response payload.
///
/// # Examples
///
/// ```
/// use ubersmith::{Cleaner, Value};
/// use serde_json::json;
///
/// let cleaner = Cleaner::fields()
///     .field("clientid", Cleaner::Int)
///     .field("balance", Cleaner::Decimal)
///     .field("active", Cleaner::Bool);
///
/// let raw = Value::from(json!({"clientid": "50", "balance": "10.50", "active": "1", "name": "Bob"}));
/// let cleaned = cleaner.apply(raw).unwrap();
///
/// assert_eq!(cleaned.get("clientid"), Some(&Value::Int(50)));
/// assert_eq!(cleaned.get("active"), Some(&Value::Bool(true)));
/// assert_eq!(cleaned.get("name"), Some(&Value::from("Bob")));
/// ```
#[derive(Debug, Clone, Default)]
pub enum Cleaner {
    /// Leave the value as decoded.
    #[default]
    Keep,
    /// See [`to_int`].
    Int,
    /// See [`to_decimal`].
    Decimal,
    /// See [`to_bool`].
    Bool,
    /// See [`to_timestamp`].
    Timestamp,
    /// Clean named fields of a mapping; other fields are left alone.
    Fields(IndexMap<String, Cleaner>),
    /// Clean every value of a mapping (or every item of a list).
    Values(Box<Cleaner>),
    /// Clean every item of a list.
    Items(Box<Cleaner>),
    /// Arbitrary conversion.
    With(fn(Value) -> Result<Value>),
}

impl Cleaner {
    /// Starts an empty [`Cleaner::Fields`].
    pub fn fields() -> Self {
        Cleaner::Fields(IndexMap::new())
    }

    /// Adds a field rule. Turns any other variant into a `Fields` cleaner.
    pub fn field(self, name: impl Into<String>, cleaner: Cleaner) -> Self {
        let mut fields = match self {
            Cleaner::Fields(fields) => fields,
            _ => IndexMap::new(),
        };
        fields.insert(name.into(), cleaner);
        Cleaner::Fields(fields)
    }

    /// Applies `cleaner` to every value of a mapping.
    pub fn values(cleaner: Cleaner) -> Self {
        Cleaner::Values(Box::new(cleaner))
    }

    /// Applies `cleaner` to every item of a list.
    pub fn items(cleaner: Cleaner) -> Self {
        Cleaner::Items(Box::new(cleaner))
    }

    /// Cleans `value`, consuming it.
    pub fn apply(&self, value: Value) -> Result<Value> {
        self.apply_at("data", value)
    }

    fn apply_at(&self, path: &str, value: Value) -> Result<Value> {
        match self {
            Cleaner::Keep => Ok(value),
            Cleaner::Int => to_int(path, &value),
            Cleaner::Decimal => to_decimal(path, &value),
            Cleaner::Bool => to_bool(path, &value),
            Cleaner::Timestamp => to_timestamp(path, &value),
            Cleaner::With(f) => f(value),
            Cleaner::Fields(rules) => match value {
                Value::Map(map) => {
                    let mut out = Map::with_capacity(map.len());
                    for (key, field) in map {
                        let cleaned = match rules.get(&key) {
                            Some(rule) => rule.apply_at(&format!("{}.{}", path, key), field)?,
                            None => field,
                        };
                        out.insert(key, cleaned);
                    }
                    Ok(Value::Map(out))
                }
                // PHP serializes an empty associative array as `[]`
                Value::Null => Ok(Value::Null),
                Value::List(items) if items.is_empty() => Ok(Value::Map(Map::new())),
                other => Err(coercion_error(path, &other, "map")),
            },
            Cleaner::Values(rule) => match value {
                Value::Map(map) => {
                    let mut out = Map::with_capacity(map.len());
                    for (key, field) in map {
                        let cleaned = rule.apply_at(&format!("{}.{}", path, key), field)?;
                        out.insert(key, cleaned);
                    }
                    Ok(Value::Map(out))
                }
                Value::List(items) => self.apply_items(rule, path, items),
                Value::Null => Ok(Value::Null),
                other => Err(coercion_error(path, &other, "map")),
            },
            Cleaner::Items(rule) => match value {
                Value::List(items) => self.apply_items(rule, path, items),
                Value::Null => Ok(Value::Null),
                other => Err(coercion_error(path, &other, "list")),
            },
        }
    }

    fn apply_items(&self, rule: &Cleaner, path: &str, items: Vec<Value>) -> Result<Value> {
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| rule.apply_at(&format!("{}[{}]", path, i), item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }
}

/// Extracts the filename from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=` form wins over plain `filename=` when both are
/// present. Returns `None` when there is no filename directive.
///
/// # Examples
///
/// ```
/// use ubersmith::coerce::filename_from_disposition;
///
/// assert_eq!(
///     filename_from_disposition(Some("inline; filename=Invoice-60.pdf")),
///     Some("Invoice-60.pdf".to_string())
/// );
/// assert_eq!(filename_from_disposition(Some("attachment")), None);
/// assert_eq!(filename_from_disposition(None), None);
/// ```
pub fn filename_from_disposition(disposition: Option<&str>) -> Option<String> {
    let disposition = disposition?;
    let mut plain = None;
    let mut extended = None;

    for param in disposition.split(';').skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(value.trim_matches('"').to_string()),
            "filename*" => {
                // charset'language'percent-encoded-name
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned());
            }
            _ => {}
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_cleaner() -> Cleaner {
        Cleaner::fields()
            .field("clientid", Cleaner::Int)
            .field("active", Cleaner::Bool)
            .field("balance", Cleaner::Decimal)
            .field("created", Cleaner::Timestamp)
    }

    #[test]
    fn test_client_fields() {
        let raw = Value::from(json!({
            "clientid": "50",
            "active": "1",
            "balance": "187559.67",
            "created": "1236056400",
            "first": "Bob",
        }));

        let cleaned = client_cleaner().apply(raw).unwrap();

        assert_eq!(cleaned.get("clientid"), Some(&Value::Int(50)));
        assert_eq!(cleaned.get("active"), Some(&Value::Bool(true)));
        assert_eq!(
            cleaned.get("balance"),
            Some(&Value::Decimal(Decimal::from_str("187559.67").unwrap()))
        );
        assert_eq!(
            cleaned.get("created").and_then(Value::as_timestamp),
            DateTime::from_timestamp(1236056400, 0)
        );
        assert_eq!(cleaned.get("first"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_values_cleans_each_record() {
        let raw = Value::from(json!({
            "60": {"invid": "60", "amount": "50.00"},
            "61": {"invid": "61", "amount": "0.00"},
        }));
        let cleaner = Cleaner::values(
            Cleaner::fields()
                .field("invid", Cleaner::Int)
                .field("amount", Cleaner::Decimal),
        );

        let cleaned = cleaner.apply(raw).unwrap();

        assert_eq!(
            cleaned.get("61").and_then(|r| r.get("invid")),
            Some(&Value::Int(61))
        );
        assert_eq!(
            cleaned.get("60").and_then(|r| r.get("amount")),
            Some(&Value::Decimal(Decimal::new(5000, 2)))
        );
    }

    #[test]
    fn test_fields_on_empty_php_array() {
        let cleaned = client_cleaner().apply(Value::List(vec![])).unwrap();
        assert_eq!(cleaned, Value::Map(Map::new()));
    }

    #[test]
    fn test_error_names_field_path() {
        let raw = Value::from(json!({"clientid": "abc"}));
        let err = client_cleaner().apply(raw).unwrap_err();
        match err {
            Error::Coercion { field, expected, .. } => {
                assert_eq!(field, "data.clientid");
                assert_eq!(expected, "int");
            }
            other => panic!("Expected Coercion, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_int() {
        assert_eq!(Cleaner::Int.apply(Value::from("42")).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_bool_variants() {
        for (raw, expected) in [("1", true), ("0", false), ("Yes", true), ("off", false), ("", false)] {
            assert_eq!(to_bool("f", &Value::from(raw)).unwrap(), Value::Bool(expected));
        }
        assert!(to_bool("f", &Value::from("maybe")).is_err());
    }

    #[test]
    fn test_fractional_timestamp() {
        let value = to_timestamp("t", &Value::from("1272400333.5")).unwrap();
        let ts = value.as_timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1272400333);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_custom_cleaner() {
        fn upper(value: Value) -> Result<Value> {
            Ok(match value {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other,
            })
        }
        let cleaner = Cleaner::fields().field("name", Cleaner::With(upper));
        let cleaned = cleaner.apply(Value::from(json!({"name": "bob"}))).unwrap();
        assert_eq!(cleaned.get("name"), Some(&Value::from("BOB")));
    }

    #[test]
    fn test_filename_forms() {
        assert_eq!(
            filename_from_disposition(Some("attachment; filename=\"Invoice 60.pdf\"")),
            Some("Invoice 60.pdf".to_string())
        );
        assert_eq!(
            filename_from_disposition(Some(
                "attachment; filename=fallback.pdf; filename*=UTF-8''R%C3%A9sum%C3%A9.pdf"
            )),
            Some("Résumé.pdf".to_string())
        );
        assert_eq!(filename_from_disposition(Some("inline; filename=")), None);
    }
}

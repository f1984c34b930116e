use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use super::{CanonicalType, TypedValue};
use crate::error::{AppError, AppResult};

const DEFAULT_DATE_PATTERN: &str = "yyyy-MM-dd";
const DEFAULT_TIME_PATTERN: &str = "HH:mm:ss";
const DEFAULT_DATETIME_PATTERN: &str = "yyyy-MM-dd'T'HH:mm:ss";

/// Coerces one raw JSON scalar into a [`TypedValue`] of `target` type.
///
/// `raw == Value::Null` always coerces to [`TypedValue::Null`] regardless of
/// `target` — callers that must reject null (see the predicate builder's
/// operator table) check for that before calling `coerce`.
pub fn coerce(raw: &Value, target: CanonicalType, format: Option<&str>) -> AppResult<TypedValue> {
    if raw.is_null() {
        return Ok(TypedValue::Null);
    }

    match target {
        CanonicalType::Varchar => Ok(TypedValue::Varchar(scalar_to_string(raw, target)?)),
        CanonicalType::Char => Ok(TypedValue::Char(scalar_to_string(raw, target)?)),
        CanonicalType::Integer => Ok(TypedValue::Integer(parse_numeric(raw, target)?)),
        CanonicalType::Bigint => Ok(TypedValue::Bigint(parse_numeric(raw, target)?)),
        CanonicalType::Decimal => Ok(TypedValue::Decimal(parse_decimal(raw, target)?)),
        CanonicalType::Boolean => Ok(TypedValue::Boolean(parse_boolean(raw, target)?)),
        CanonicalType::LocalDate => Ok(TypedValue::LocalDate(parse_date(
            raw,
            format.unwrap_or(DEFAULT_DATE_PATTERN),
            target,
        )?)),
        CanonicalType::LocalTime => Ok(TypedValue::LocalTime(parse_time(
            raw,
            format.unwrap_or(DEFAULT_TIME_PATTERN),
            target,
        )?)),
        CanonicalType::LocalDateTime => Ok(TypedValue::LocalDateTime(parse_datetime(
            raw,
            format.unwrap_or(DEFAULT_DATETIME_PATTERN),
            target,
        )?)),
        CanonicalType::Uuid => Ok(TypedValue::Uuid(parse_uuid(raw, target)?)),
        CanonicalType::Json => Ok(TypedValue::Json(json_to_raw_string(raw))),
        CanonicalType::Jsonb => Ok(TypedValue::Jsonb(json_to_raw_string(raw))),
    }
}

/// Coerces a raw JSON value into a list of [`TypedValue`]s. A bare scalar is
/// promoted to a one-element list; a JSON array is coerced element-wise.
pub fn coerce_list(
    raw: &Value,
    target: CanonicalType,
    format: Option<&str>,
) -> AppResult<Vec<TypedValue>> {
    match raw {
        Value::Array(items) => items.iter().map(|v| coerce(v, target, format)).collect(),
        other => Ok(vec![coerce(other, target, format)?]),
    }
}

fn type_error(target: CanonicalType, raw: &Value) -> AppError {
    AppError::invalid(format!(
        "cannot coerce value {raw} to {}",
        target.cast_keyword()
    ))
}

fn scalar_to_string(raw: &Value, target: CanonicalType) -> AppResult<String> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(type_error(target, raw)),
    }
}

fn parse_numeric<T: FromStr>(raw: &Value, target: CanonicalType) -> AppResult<T> {
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(type_error(target, raw)),
    };
    text.parse::<T>().map_err(|_| type_error(target, raw))
}

fn parse_decimal(raw: &Value, target: CanonicalType) -> AppResult<Decimal> {
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(type_error(target, raw)),
    };
    Decimal::from_str(&text).map_err(|_| type_error(target, raw))
}

fn parse_boolean(raw: &Value, target: CanonicalType) -> AppResult<bool> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(type_error(target, raw)),
        },
        _ => Err(type_error(target, raw)),
    }
}

fn parse_date(raw: &Value, pattern: &str, target: CanonicalType) -> AppResult<NaiveDate> {
    let text = require_string(raw, target)?;
    let strftime = translate_pattern(pattern);
    NaiveDate::parse_from_str(text, &strftime).map_err(|_| type_error(target, raw))
}

fn parse_time(raw: &Value, pattern: &str, target: CanonicalType) -> AppResult<NaiveTime> {
    let text = require_string(raw, target)?;
    let strftime = translate_pattern(pattern);
    NaiveTime::parse_from_str(text, &strftime).map_err(|_| type_error(target, raw))
}

fn parse_datetime(raw: &Value, pattern: &str, target: CanonicalType) -> AppResult<NaiveDateTime> {
    let text = require_string(raw, target)?;
    let strftime = translate_pattern(pattern);
    NaiveDateTime::parse_from_str(text, &strftime).map_err(|_| type_error(target, raw))
}

fn parse_uuid(raw: &Value, target: CanonicalType) -> AppResult<Uuid> {
    let text = require_string(raw, target)?;
    Uuid::parse_str(text).map_err(|_| type_error(target, raw))
}

fn require_string<'a>(raw: &'a Value, target: CanonicalType) -> AppResult<&'a str> {
    raw.as_str().ok_or_else(|| type_error(target, raw))
}

fn json_to_raw_string(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Translates a Java-style date/time pattern (`yyyy-MM-dd'T'HH:mm:ss`) into
/// a chrono strftime pattern. Covers the tokens used by the defaults in
/// §4.1; quoted literal sections (`'T'`) pass through verbatim.
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                // Quoted literal: copy verbatim until the closing quote.
                for literal in chars.by_ref() {
                    if literal == '\'' {
                        break;
                    }
                    out.push(literal);
                }
            }
            'y' => {
                let run = consume_run(&mut chars, 'y') + 1;
                out.push_str(if run >= 4 { "%Y" } else { "%y" });
            }
            'M' => {
                let run = consume_run(&mut chars, 'M') + 1;
                out.push_str(if run >= 2 { "%m" } else { "%-m" });
            }
            'd' => {
                let run = consume_run(&mut chars, 'd') + 1;
                out.push_str(if run >= 2 { "%d" } else { "%-d" });
            }
            'H' => {
                let run = consume_run(&mut chars, 'H') + 1;
                out.push_str(if run >= 2 { "%H" } else { "%-H" });
            }
            'm' => {
                let run = consume_run(&mut chars, 'm') + 1;
                out.push_str(if run >= 2 { "%M" } else { "%-M" });
            }
            's' => {
                let run = consume_run(&mut chars, 's') + 1;
                out.push_str(if run >= 2 { "%S" } else { "%-S" });
            }
            other => out.push(other),
        }
    }
    out
}

fn consume_run(chars: &mut std::iter::Peekable<std::str::Chars>, token: char) -> usize {
    let mut count = 0;
    while chars.peek() == Some(&token) {
        chars.next();
        count += 1;
    }
    count
}

//! Constraint-aware rendering of attribute values
//!
//! Rendering depends on the active locale and on the constraint data, never
//! on which records are present.

use crate::types::{
    language::Locale,
    permissions::ConstraintData,
    resource::Constraint,
};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Fraction digits kept when a number carries no `decimals` setting
const MAX_FRACTION_DIGITS: usize = 10;

/// Numeric attribute value; integers never go through `f64`
#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Integer(i128),
    Float(f64),
}

impl Numeric {
    fn percent(self) -> Self {
        match self {
            Numeric::Integer(i) => i
                .checked_mul(100)
                .map_or(Numeric::Float(i as f64 * 100.0), Numeric::Integer),
            Numeric::Float(f) => Numeric::Float(f * 100.0),
        }
    }

    fn format(self, decimals: Option<u32>, locale: &Locale) -> String {
        match self {
            Numeric::Integer(i) => format_integer(i, decimals, locale),
            Numeric::Float(f) => format_number(f, decimals, locale),
        }
    }
}

/// Render `value` as text the way a user of `locale` expects to read it.
pub fn format_value(
    value: &Value,
    constraint: Option<&Constraint>,
    locale: &Locale,
    data: &ConstraintData,
) -> String {
    if value.is_null() {
        return String::new();
    }

    match constraint {
        None | Some(Constraint::Text) => raw_text(value),
        Some(Constraint::Number { decimals }) => match as_number(value) {
            Some(n) => n.format(*decimals, locale),
            None => raw_text(value),
        },
        Some(Constraint::Percentage { decimals }) => match as_number(value) {
            Some(n) => format!("{}%", n.percent().format(*decimals, locale)),
            None => raw_text(value),
        },
        Some(Constraint::Boolean) => {
            if is_truthy(value) {
                locale.yes.to_string()
            } else {
                locale.no.to_string()
            }
        }
        Some(Constraint::DateTime) => match as_date_time(value) {
            Some(dt) => dt
                .with_timezone(&time_zone(data))
                .format(locale.date_time_pattern)
                .to_string(),
            None => raw_text(value),
        },
        Some(Constraint::Select { options }) => {
            let raw = raw_text(value);
            options
                .iter()
                .find(|o| o.value == raw)
                .map(|o| o.display_value.clone().unwrap_or_else(|| o.value.clone()))
                .unwrap_or(raw)
        }
        Some(Constraint::User) => {
            let raw = raw_text(value);
            data.user_by_email(&raw)
                .map(|u| u.display_name().to_string())
                .unwrap_or(raw)
        }
    }
}

/// Format a number with the locale's separators.
///
/// With `decimals` the value is rounded to that many places, otherwise it is
/// rounded to ten places and trailing zeros are dropped.
pub fn format_number(n: f64, decimals: Option<u32>, locale: &Locale) -> String {
    let fixed = match decimals {
        Some(d) => format!("{:.*}", d as usize, n),
        None => {
            let rounded = format!("{:.*}", MAX_FRACTION_DIGITS, n);
            let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
            if trimmed == "-0" {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
    };
    group_digits(&fixed, locale)
}

fn format_integer(i: i128, decimals: Option<u32>, locale: &Locale) -> String {
    let fixed = match decimals {
        Some(d) if d > 0 => format!("{}.{}", i, "0".repeat(d as usize)),
        _ => i.to_string(),
    };
    group_digits(&fixed, locale)
}

/// Apply the locale's group and decimal separators to plain `-1234.5` text
fn group_digits(fixed: &str, locale: &Locale) -> String {
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            if let Some(sep) = locale.group_separator {
                grouped.push(sep);
            }
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{}{}{}{}", sign, grouped, locale.decimal_separator, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Text of a JSON value without string quoting
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<Numeric> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Numeric::Integer(i as i128))
            } else if let Some(u) = n.as_u64() {
                Some(Numeric::Integer(u as i128))
            } else {
                n.as_f64().map(Numeric::Float)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i128>() {
                Ok(i) => Some(Numeric::Integer(i)),
                Err(_) => s.parse().ok().map(Numeric::Float),
            }
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn as_date_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Zone of the constraint data; unknown or missing names render in UTC
fn time_zone(data: &ConstraintData) -> Tz {
    data.timezone
        .as_deref()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

//! Typed fact values. The store keeps text; the binder works with these.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Canonical textual form for dates, e.g. `June 3, 2024`.
pub const CANONICAL_DATE_FORMAT: &str = "%B %-d, %Y";

const ACCEPTED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a recognised date")]
    NotADate(String),
}

impl FactValue {
    /// Text form written back to the store.
    pub fn to_text(&self) -> String {
        match self {
            FactValue::Text(s) => s.clone(),
            FactValue::Number(n) => n.to_string(),
            FactValue::Date(d) => format_date(*d),
        }
    }
}

/// Parses an amount such as `1000`, `1,250.50` or `$3,000`.
pub fn parse_number(raw: &str) -> Result<f64, ValueError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValueError::NotANumber(raw.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValueError> {
    let trimmed = raw.trim();
    ACCEPTED_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ValueError::NotADate(raw.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

/// Rewrites a date in canonical form. Fails if the text is not a date.
pub fn normalize_date_text(raw: &str) -> Result<String, ValueError> {
    parse_date(raw).map(format_date)
}

/// Flattens a JSON scalar into fact text. Nulls, blanks and nested values yield `None`.
pub fn stringify_json_value(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            return None
        }
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_number_plain_and_formatted() {
        assert_eq!(parse_number("1000"), Ok(1000.0));
        assert_eq!(parse_number(" $1,250.50 "), Ok(1250.5));
        assert_eq!(parse_number("-20"), Ok(-20.0));
    }

    #[test]
    fn test_parse_number_rejects_text() {
        assert!(matches!(
            parse_number("about a grand"),
            Err(ValueError::NotANumber(_))
        ));
        assert!(parse_number("").is_err());
        assert!(parse_number("NaN").is_err());
    }

    #[test]
    fn test_parse_date_accepts_several_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(parse_date("2024-06-03"), Ok(expected));
        assert_eq!(parse_date("June 3, 2024"), Ok(expected));
        assert_eq!(parse_date("Jun 03, 2024"), Ok(expected));
        assert_eq!(parse_date("06/03/2024"), Ok(expected));
        assert!(parse_date("next tuesday").is_err());
    }

    #[test]
    fn test_canonical_date_text() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(format_date(d), "June 3, 2024");
        assert_eq!(normalize_date_text("2024-06-03").unwrap(), "June 3, 2024");
        assert_eq!(FactValue::Date(d).to_text(), "June 3, 2024");
    }

    #[test]
    fn test_stringify_json_value() {
        assert_eq!(stringify_json_value(&json!("Acme")), Some("Acme".into()));
        assert_eq!(stringify_json_value(&json!(10000)), Some("10000".into()));
        assert_eq!(stringify_json_value(&json!(2.5)), Some("2.5".into()));
        assert_eq!(stringify_json_value(&json!(true)), Some("true".into()));
        assert_eq!(stringify_json_value(&json!("  ")), None);
        assert_eq!(stringify_json_value(&json!(null)), None);
        assert_eq!(stringify_json_value(&json!({"a": 1})), None);
    }
}

use crate::{core::value::Value, error::ModelError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Email,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::Email => "email",
        }
    }

    /// Converts a raw import cell into a typed value. Blank cells become `Null`.
    pub fn coerce(&self, raw: &str) -> Result<Value, ModelError> {
        let cell = raw.trim();
        if cell.is_empty() {
            return Ok(Value::Null);
        }

        let invalid = || ModelError::InvalidValue {
            expected: self.as_str(),
            value: cell.to_string(),
        };

        match self {
            DataType::Text => Ok(Value::String(raw.to_string())),
            DataType::Integer => cell.parse::<i64>().map(Value::Int).map_err(|_| invalid()),
            DataType::Decimal => cell
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Float)
                .ok_or_else(invalid),
            DataType::Boolean => match cell.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "y" | "on" => Ok(Value::Boolean(true)),
                "0" | "false" | "no" | "n" | "off" => Ok(Value::Boolean(false)),
                _ => Err(invalid()),
            },
            DataType::Date => parse_date(cell)
                .or_else(|| parse_timestamp(cell).map(|ts| ts.date_naive()))
                .map(Value::Date)
                .ok_or_else(invalid),
            DataType::Timestamp => parse_timestamp(cell)
                .or_else(|| parse_date(cell).map(|d| d.and_time(NaiveTime::MIN).and_utc()))
                .map(Value::Timestamp)
                .ok_or_else(invalid),
            DataType::Email => {
                let (local, domain) = cell.split_once('@').ok_or_else(invalid)?;
                let valid = !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !cell.chars().any(char::is_whitespace);
                if valid {
                    Ok(Value::String(cell.to_ascii_lowercase()))
                } else {
                    Err(invalid())
                }
            }
        }
    }

    /// Canonical form of a raw value used by duplicate checks. Date-like
    /// columns collapse to a UTC timestamp; values that fail coercion are
    /// compared verbatim.
    pub fn match_key(&self, raw: &str) -> Value {
        match self.coerce(raw) {
            Ok(value @ (Value::Date(_) | Value::Timestamp(_))) => value
                .as_timestamp()
                .map(Value::Timestamp)
                .unwrap_or(value),
            Ok(value) => value,
            Err(_) => Value::String(raw.trim().to_string()),
        }
    }
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
}

fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(cell) {
        return Some(ts.with_timezone(&Utc));
    }

    if let Some(ts) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
    {
        return Some(ts.and_utc());
    }

    // Unix seconds
    cell.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

impl FromStr for DataType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" | "varchar" => Ok(DataType::Text),
            "integer" | "int" | "numeric" => Ok(DataType::Integer),
            "decimal" | "float" | "currency" => Ok(DataType::Decimal),
            "boolean" | "bool" | "checkbox" => Ok(DataType::Boolean),
            "date" => Ok(DataType::Date),
            "timestamp" | "datetime" => Ok(DataType::Timestamp),
            "email" => Ok(DataType::Email),
            other => Err(ModelError::UnknownDataType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

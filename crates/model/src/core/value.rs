use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, hash::Hash};

/// A coerced field value as it is stored on a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use Value::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Int(v) => v.hash(state),
            Float(v) => {
                // Hash the bits of the float to handle NaN and -0.0 correctly
                let bits = v.to_bits();
                bits.hash(state);
            }
            String(v) => v.hash(state),
            Boolean(v) => v.hash(state),
            Date(v) => v.hash(state),
            Timestamp(v) => v.hash(state),
            Null => {}
        }
    }
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::String(v) => v.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// `true` for `Null` and for strings that are empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Dates compare as midnight UTC so a date column matches a timestamp
    /// holding the same day.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN).and_utc()),
            _ => None,
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Date(_) | Timestamp(_), Date(_) | Timestamp(_)) => {
                self.as_timestamp()?.partial_cmp(&other.as_timestamp()?)
            }
            (Null, Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    pub fn equal(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Null => Ok(()),
        }
    }
}

//! Typed scalars flowing between the spreadsheet readers and DuckDB.

use crate::database::column::ColumnType;
use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use duckdb::types::TimeUnit;
use duckdb::types::ToSql;
use duckdb::types::ToSqlOutput;
use duckdb::types::Value;
use std::fmt::Display;

/// A single observed cell value, or a value read back from a table.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl CellValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, CellValue::Integer(_))
    }

    /// Integers count as numeric so a column mixing 1 and 1.5 widens to float.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Integer(_) | CellValue::Float(_))
    }

    #[inline]
    pub fn is_boolean(&self) -> bool {
        matches!(self, CellValue::Boolean(_))
    }

    #[inline]
    pub fn is_timestamp(&self) -> bool {
        matches!(self, CellValue::Timestamp(_))
    }

    /// Shapes the value for a column of the given type before insertion.
    ///
    /// Only lossless widenings happen here (integer to float, anything to
    /// text). Any other mismatch is passed through untouched and left for
    /// the database to cast or reject.
    pub fn coerce(self, kind: ColumnType) -> CellValue {
        match (kind, self) {
            (_, CellValue::Null) => CellValue::Null,
            (ColumnType::Float, CellValue::Integer(value)) => CellValue::Float(value as f64),
            (ColumnType::Text, CellValue::Text(value)) => CellValue::Text(value),
            (ColumnType::Text, value) => CellValue::Text(value.to_string()),
            (_, value) => value,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Boolean(value) => write!(f, "{value}"),
            CellValue::Timestamp(value) => write!(f, "{value}"),
            CellValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Integer(value as i64)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::Timestamp(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

impl From<Value> for CellValue {
    /// Maps a DuckDB value onto the five storage categories.
    /// Types outside those categories are rendered as text.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Boolean(value) => CellValue::Boolean(value),
            Value::TinyInt(value) => CellValue::Integer(value as i64),
            Value::SmallInt(value) => CellValue::Integer(value as i64),
            Value::Int(value) => CellValue::Integer(value as i64),
            Value::BigInt(value) => CellValue::Integer(value),
            Value::UTinyInt(value) => CellValue::Integer(value as i64),
            Value::USmallInt(value) => CellValue::Integer(value as i64),
            Value::UInt(value) => CellValue::Integer(value as i64),
            Value::UBigInt(value) => match i64::try_from(value) {
                Ok(value) => CellValue::Integer(value),
                Err(_) => CellValue::Float(value as f64),
            },
            Value::HugeInt(value) => match i64::try_from(value) {
                Ok(value) => CellValue::Integer(value),
                Err(_) => CellValue::Float(value as f64),
            },
            Value::Float(value) => CellValue::Float(value as f64),
            Value::Double(value) => CellValue::Float(value),
            Value::Text(value) => CellValue::Text(value),
            Value::Timestamp(unit, value) => from_micros(to_micros(unit, value)),
            Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)))
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(CellValue::Timestamp)
                .unwrap_or(CellValue::Null),
            other => CellValue::Text(format!("{other:?}")),
        }
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn from_micros(micros: i64) -> CellValue {
    DateTime::from_timestamp_micros(micros)
        .map(|datetime| CellValue::Timestamp(datetime.naive_utc()))
        .unwrap_or(CellValue::Null)
}

impl ToSql for CellValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            CellValue::Null => Value::Null,
            CellValue::Integer(value) => Value::BigInt(*value),
            CellValue::Float(value) => Value::Double(*value),
            CellValue::Boolean(value) => Value::Boolean(*value),
            CellValue::Timestamp(value) => {
                Value::Timestamp(TimeUnit::Microsecond, value.and_utc().timestamp_micros())
            }
            CellValue::Text(value) => Value::Text(value.to_owned()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

use crate::database::value::CellValue;

/// Storage category of a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit signed integers
    Integer,
    /// Double-precision floating point numbers
    Float,
    /// Boolean values (true/false)
    Boolean,
    /// Date and time with microsecond precision
    Timestamp,
    /// Variable-length strings, the fallback for everything else
    Text,
}

impl ColumnType {
    /// Returns the DuckDB type used in `CREATE TABLE` and `ADD COLUMN`.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "VARCHAR",
        }
    }

    /// Parses a reflected SQL type name. Supports the usual aliases of each category.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TINYINT" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" | "HUGEINT" | "UTINYINT"
            | "USMALLINT" | "UINTEGER" | "UBIGINT" => Some(Self::Integer),
            "FLOAT" | "REAL" | "DOUBLE" => Some(Self::Float),
            "BOOL" | "BOOLEAN" => Some(Self::Boolean),
            "DATETIME" | "TIMESTAMP" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS"
            | "DATE" => Some(Self::Timestamp),
            "TEXT" | "STRING" | "VARCHAR" => Some(Self::Text),
            other if other.starts_with("DECIMAL") || other.starts_with("NUMERIC") => Some(Self::Float),
            other if other.starts_with("VARCHAR") => Some(Self::Text),
            _ => None,
        }
    }

    /// Infers the storage category of a column from its observed values.
    ///
    /// Nulls carry no type information and are ignored. The remaining values
    /// are checked in a fixed order: integer, float, boolean, timestamp.
    /// An all-null column, or one mixing categories, falls back to text.
    pub fn infer<'a, I>(values: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let values: Vec<&CellValue> = values.into_iter().filter(|value| !value.is_null()).collect();
        if values.is_empty() {
            ColumnType::Text
        } else if values.iter().all(|value| value.is_integer()) {
            ColumnType::Integer
        } else if values.iter().all(|value| value.is_numeric()) {
            ColumnType::Float
        } else if values.iter().all(|value| value.is_boolean()) {
            ColumnType::Boolean
        } else if values.iter().all(|value| value.is_timestamp()) {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }
}

/// A normalized column of an incoming sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnType,
    /// Only the first column of a sheet is the key
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    /// Column definition as used inside `CREATE TABLE`.
    pub(crate) fn definition(&self) -> String {
        let mut definition = format!("{} {}", super::quote_ident(&self.name), self.kind.as_sql());
        if self.is_primary_key {
            definition.push_str(" PRIMARY KEY");
        }
        definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn infer(values: &[CellValue]) -> ColumnType {
        ColumnType::infer(values)
    }

    #[test]
    fn integral_values_infer_integer() {
        assert_eq!(infer(&[CellValue::Integer(1), CellValue::Integer(-7)]), ColumnType::Integer);
    }

    #[test]
    fn one_fractional_value_widens_to_float() {
        assert_eq!(infer(&[CellValue::Integer(1), CellValue::Float(2.5)]), ColumnType::Float);
        assert_eq!(infer(&[CellValue::Float(0.1)]), ColumnType::Float);
    }

    #[test]
    fn boolean_only_infers_boolean() {
        assert_eq!(infer(&[CellValue::Boolean(true), CellValue::Boolean(false)]), ColumnType::Boolean);
    }

    #[test]
    fn dates_infer_timestamp() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(infer(&[CellValue::Timestamp(date)]), ColumnType::Timestamp);
    }

    #[test]
    fn empty_all_null_and_mixed_fall_back_to_text() {
        assert_eq!(infer(&[]), ColumnType::Text);
        assert_eq!(infer(&[CellValue::Null, CellValue::Null]), ColumnType::Text);
        assert_eq!(infer(&[CellValue::Integer(1), CellValue::Boolean(true)]), ColumnType::Text);
        assert_eq!(infer(&[CellValue::Integer(1), CellValue::Text("1".into())]), ColumnType::Text);
    }

    #[test]
    fn nulls_do_not_change_the_inferred_type() {
        assert_eq!(infer(&[CellValue::Null, CellValue::Integer(3), CellValue::Null]), ColumnType::Integer);
    }

    #[test]
    fn parse_reflected_types() {
        assert_eq!(ColumnType::parse("BIGINT"), Some(ColumnType::Integer));
        assert_eq!(ColumnType::parse("integer"), Some(ColumnType::Integer));
        assert_eq!(ColumnType::parse("DECIMAL(18,3)"), Some(ColumnType::Float));
        assert_eq!(ColumnType::parse("VARCHAR"), Some(ColumnType::Text));
        assert_eq!(ColumnType::parse("TIMESTAMP"), Some(ColumnType::Timestamp));
        assert_eq!(ColumnType::parse("BLOB"), None);
    }

    #[test]
    fn primary_key_definition_is_quoted() {
        let column = ColumnDescriptor {
            name: "order id".into(),
            kind: ColumnType::Integer,
            is_primary_key: true,
        };
        assert_eq!(column.definition(), "\"order id\" BIGINT PRIMARY KEY");
    }
}

use crate::database::value::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use iso8601_duration::Duration as IsoDuration;
use std::collections::HashSet;

/// Largest integer a double holds exactly; spreadsheet numbers are doubles.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992f64;

const MICROSECONDS_PER_DAY: f64 = 86_400_000_000f64;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as `1` / `0`
    Boolean,
    /// Numeric values
    Number,
    /// Serial date/time number formatted as a date and a time
    NumberDateTime { is_1904: bool },
    /// Serial date/time number formatted as a date only
    NumberDate { is_1904: bool },
    /// Serial number formatted as a time of day
    NumberTime,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Plain text
    Text,
    /// Index into the shared string table, resolved to `Text` while reading
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(Self::NumberDateTime { is_1904 }),
            "14" | "15" | "16" | "17" => Some(Self::NumberDate { is_1904 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::NumberTime),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Date and time tokens inside quoted literals, escapes and `[...]`
    /// sections (colors, locales) are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::NumberDateTime { is_1904 },
            (true, false) => Self::NumberDate { is_1904 },
            (false, true) => Self::NumberTime,
            (false, false) => Self::Number,
        }
    }
}

/// Represents a single cell in a spreadsheet with position, type, and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Cell value as written in the workbook
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Interprets the raw value according to the cell type.
    pub(crate) fn to_value(&self, nulls: &HashSet<String>) -> Result<CellValue, String> {
        match self.kind {
            CellType::Empty => Ok(CellValue::Null),
            // Only kept by the readers when error cells must fail the read
            CellType::Error => Err(self.value.to_owned()),
            CellType::Boolean => Ok(CellValue::Boolean(self.value == "1" || self.value.eq_ignore_ascii_case("true"))),
            CellType::Number => self.to_number(),
            CellType::NumberDateTime { is_1904 } | CellType::NumberDate { is_1904 } => {
                let serial = self.to_double()?;
                serial_to_datetime(serial, is_1904)
                    .map(CellValue::Timestamp)
                    .ok_or_else(|| format!("serial date '{}' out of range", self.value))
            }
            CellType::NumberTime => Ok(CellValue::Text(to_time_string(self.to_double()?))),
            CellType::IsoDateTime => self.to_iso_datetime(),
            CellType::IsoDuration => self.to_iso_duration(),
            CellType::Text | CellType::SharedString => {
                if nulls.contains(&self.value) {
                    Ok(CellValue::Null)
                } else {
                    Ok(CellValue::Text(self.value.to_owned()))
                }
            }
        }
    }

    fn to_double(&self) -> Result<f64, String> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    /// Whole numbers become integers; anything with a fraction stays a float.
    fn to_number(&self) -> Result<CellValue, String> {
        if let Ok(integer) = self.value.trim().parse::<i64>() {
            return Ok(CellValue::Integer(integer));
        }
        let number = self.to_double()?;
        if number.is_finite() && number.fract() == 0.0 && number.abs() <= MAX_EXACT_INTEGER {
            Ok(CellValue::Integer(number as i64))
        } else {
            Ok(CellValue::Float(number))
        }
    }

    fn to_iso_datetime(&self) -> Result<CellValue, String> {
        let value = self.value.trim();
        let datetime = if value.contains('T') {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|_| format!("parse '{}' to NaiveDateTime failed", self.value))?
        } else {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| format!("parse '{}' to NaiveDate failed", self.value))?
                .and_hms_opt(0, 0, 0)
                .expect("Append 00:00:00")
        };
        Ok(CellValue::Timestamp(datetime))
    }

    fn to_iso_duration(&self) -> Result<CellValue, String> {
        let duration = self
            .value
            .parse::<IsoDuration>()
            .map_err(|_| format!("parse '{}' to iso8601 duration failed", self.value))?;
        let seconds = duration.day as f64 * 86_400f64
            + duration.hour as f64 * 3_600f64
            + duration.minute as f64 * 60f64
            + duration.second as f64;
        Ok(CellValue::Text(to_time_string(seconds / 86_400f64)))
    }
}

/// Converts an Excel serial number to a date and time.
/// Serials below 60 in the 1900 system predate the Lotus 1-2-3 leap year bug.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0f64 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let micros = (serial.fract() * MICROSECONDS_PER_DAY).round() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::microseconds(micros))
}

/// Formats the fraction of a day as `HH:MM:SS` (with milliseconds when present).
/// Whole days are folded into the hours.
pub(crate) fn to_time_string(factor: f64) -> String {
    let mut rest = (factor * 86_400_000f64).round() as i64;
    let milliseconds = rest % 1_000;
    rest /= 1_000;
    let seconds = rest % 60;
    rest /= 60;
    let minutes = rest % 60;
    let hours = rest / 60;
    if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

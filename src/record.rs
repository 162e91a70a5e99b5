use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde_json::Value;
use snafu::prelude::*;
use std::collections::HashMap;

use crate::{Error, TypeRenderSnafu};

/// One row of upload data, keyed by column name.
pub type Record = HashMap<String, Cell>;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single value in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Text written into the CSV field for this value.
    ///
    /// Dates and date-times are written as calendar dates only, booleans
    /// as `1`/`0`. Floats use their shortest round-trip form and keep a
    /// decimal point when integral (`10.0`), switch to exponent notation
    /// from `1e16` up and below `1e-4`, and write `NaN`/`inf` as such.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Integer(number) => number.to_string(),
            Cell::Unsigned(number) => number.to_string(),
            Cell::Number(number) => format!("{number:?}"),
            Cell::Boolean(true) => "1".into(),
            Cell::Boolean(false) => "0".into(),
            Cell::Date(date) => date.format(DATE_FORMAT).to_string(),
            Cell::DateTime(datetime) => {
                if datetime.num_seconds_from_midnight() != 0 || datetime.nanosecond() != 0 {
                    log::warn!("Truncating {datetime} to its calendar date, time of day is not uploaded");
                }
                datetime.date().format(DATE_FORMAT).to_string()
            }
        }
    }

    pub fn from_json(value: Value) -> Result<Cell, Error> {
        match value {
            Value::Null => Ok(Cell::Null),
            Value::Bool(boolean) => Ok(Cell::Boolean(boolean)),
            Value::String(text) => Ok(Cell::Text(text)),
            Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Ok(Cell::Integer(integer))
                } else if let Some(unsigned) = number.as_u64() {
                    Ok(Cell::Unsigned(unsigned))
                } else {
                    Ok(number
                        .as_f64()
                        .map_or_else(|| Cell::Text(number.to_string()), Cell::Number))
                }
            }
            other => TypeRenderSnafu {
                message: format!("Value {other} is not a scalar and can not be written to CSV"),
            }
            .fail(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Integer(value.into())
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Unsigned(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Boolean(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::DateTime(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

/// Convert a JSON array of objects into records.
pub fn records_from_json(value: &Value) -> Result<Vec<Record>, Error> {
    let rows = value.as_array().context(TypeRenderSnafu {
        message: "Records need to be a JSON array",
    })?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let object = row.as_object().context(TypeRenderSnafu {
            message: "Each record needs to be a JSON object",
        })?;
        let mut record = Record::with_capacity(object.len());
        for (key, cell) in object {
            record.insert(key.clone(), Cell::from_json(cell.clone())?);
        }
        records.push(record);
    }
    Ok(records)
}

//! Polars Column Adapters
//!
//! Moves values between polars columns and the Rust types the transforms
//! compute with. Decimal columns travel as `i128` mantissas at the column's
//! scale, date-time columns as integer ticks in the column's time unit.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use rust_decimal::Decimal;

use crate::typing::ColumnTyper;

/// Decimal column at exactly `scale` fractional digits.
///
/// Values are rounded half-to-even to `scale` before their mantissas are
/// taken, so the column never holds a value at another scale.
pub fn decimal_series(name: &str, scale: u32, values: &[Option<Decimal>]) -> PolarsResult<Series> {
    let mantissas = values
        .iter()
        .map(|v| v.map(|d| ColumnTyper::rescale(d, scale).mantissa()));

    Ok(Int128Chunked::from_iter_options(name, mantissas)
        .into_decimal(None, scale as usize)?
        .into_series())
}

/// Nanosecond date-time column without a time zone
pub fn datetime_series(name: &str, values: &[Option<NaiveDateTime>]) -> Series {
    let nanos = values
        .iter()
        .map(|v| v.and_then(|dt| dt.and_utc().timestamp_nanos_opt()));

    Int64Chunked::from_iter_options(name, nanos)
        .into_datetime(TimeUnit::Nanoseconds, None)
        .into_series()
}

/// Read a decimal column back into `rust_decimal` values at the column's scale
pub fn decimal_values(series: &Series) -> PolarsResult<Vec<Option<Decimal>>> {
    let ca = series.decimal()?;
    let scale = ca.scale() as u32;
    let mantissas: &Int128Chunked = ca;

    mantissas
        .into_iter()
        .map(|m| {
            m.map(|m| {
                Decimal::try_from_i128_with_scale(m, scale).map_err(|e| {
                    PolarsError::ComputeError(
                        format!("{}: decimal {}e-{} out of range: {}", series.name(), m, scale, e).into(),
                    )
                })
            })
            .transpose()
        })
        .collect()
}

/// Read a date-time column of any time unit as naive UTC date-times
pub fn datetime_values(series: &Series) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let ca = series.datetime()?;
    let unit = ca.time_unit();
    let ticks: &Int64Chunked = ca;

    Ok(ticks
        .into_iter()
        .map(|t| t.and_then(|t| from_ticks(t, unit)))
        .collect())
}

fn from_ticks(ticks: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(ticks).naive_utc()),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(ticks).map(|dt| dt.naive_utc()),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(ticks).map(|dt| dt.naive_utc()),
    }
}

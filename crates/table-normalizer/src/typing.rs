//! Column Typing and Unit Scaling
//!
//! Casts raw exchange columns to canonical types: fixed-point decimals with an
//! exact scale, and naive date-times at nanosecond resolution. Rounding is
//! always half-to-even so the result does not depend on a library default.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::{ParseErrorKind, RowParseError, SchemaError};
use crate::frame;

/// Fractional digits of price and strike columns
pub const PRICE_SCALE: u32 = 2;

/// Fractional digits of yield tenor columns
pub const YIELD_SCALE: u32 = 6;

/// Layouts accepted for date-time strings, tried in order
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Values of one cast column plus the rows that failed to convert
#[derive(Debug, Clone, PartialEq)]
pub struct Cast<T> {
    pub values: Vec<Option<T>>,
    pub failures: Vec<RowParseError>,
}

impl<T> Cast<T> {
    fn with_capacity(n: usize) -> Self {
        Self {
            values: Vec::with_capacity(n),
            failures: Vec::new(),
        }
    }

    fn push_failure(&mut self, row: usize, column: &'static str, value: String, kind: ParseErrorKind) {
        self.values.push(None);
        self.failures.push(RowParseError {
            row,
            column,
            value,
            kind,
        });
    }
}

/// Which input types a required column may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Utf8,
    Int64,
    /// Any integer or float width, decimal, or decimal text
    Numeric,
    /// Date-time text or an already typed date-time
    Temporal,
}

impl Accepts {
    fn matches(&self, dtype: &DataType) -> bool {
        match self {
            Accepts::Utf8 => matches!(dtype, DataType::String),
            Accepts::Int64 => matches!(dtype, DataType::Int64),
            Accepts::Numeric => {
                dtype.is_integer()
                    || dtype.is_float()
                    || matches!(dtype, DataType::Decimal(..) | DataType::String)
            }
            Accepts::Temporal => matches!(dtype, DataType::String | DataType::Datetime(..)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Accepts::Utf8 => "str",
            Accepts::Int64 => "i64",
            Accepts::Numeric => "integer, float, decimal or numeric str",
            Accepts::Temporal => "date-time str or datetime",
        }
    }
}

/// Shared casting logic of the option, stock and treasury transforms
pub struct ColumnTyper;

impl ColumnTyper {
    /// Check that every `(column, accepts)` requirement holds before any row work
    pub fn check_schema(table: &DataFrame, required: &[(&str, Accepts)]) -> Result<(), SchemaError> {
        for (name, accepts) in required {
            let series = table
                .column(name)
                .map_err(|_| SchemaError::MissingColumn(name.to_string()))?;
            let dtype = series.dtype();
            if !accepts.matches(dtype) {
                return Err(SchemaError::UnexpectedType {
                    column: name.to_string(),
                    expected: accepts.describe(),
                    actual: dtype.clone(),
                });
            }
        }
        Ok(())
    }

    /// Round half-to-even to `scale` digits and pad so exactly `scale` remain.
    ///
    /// Padding cannot exceed the 96-bit mantissa: a value with more than
    /// `28 - scale` integer digits keeps a smaller scale. Prices and yields
    /// are many orders of magnitude below that bound.
    pub fn rescale(value: Decimal, scale: u32) -> Decimal {
        let mut scaled = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
        scaled.rescale(scale);
        scaled
    }

    /// Cast a numeric column to fixed-point decimals at `scale`.
    ///
    /// Floats convert through their shortest decimal form, so `187.1` becomes
    /// `187.10` rather than its binary expansion. Decimal columns are
    /// rescaled like every other input, whatever scale they declare.
    pub fn to_decimal(series: &Series, column: &'static str, scale: u32) -> PolarsResult<Cast<Decimal>> {
        let mut cast = Cast::with_capacity(series.len());

        match series.dtype() {
            DataType::Decimal(..) => {
                cast.values = frame::decimal_values(series)?
                    .into_iter()
                    .map(|v| v.map(|d| Self::rescale(d, scale)))
                    .collect();
            }
            dtype if dtype.is_integer() => {
                let ints = series.cast(&DataType::Int64)?;
                cast.values = ints
                    .i64()?
                    .into_iter()
                    .map(|v| v.map(|i| Self::rescale(Decimal::from(i), scale)))
                    .collect();
            }
            dtype if dtype.is_float() => {
                let floats = series.cast(&DataType::Float64)?;
                for (row, v) in floats.f64()?.into_iter().enumerate() {
                    match v {
                        None => cast.values.push(None),
                        Some(f) => match Decimal::from_f64(f) {
                            Some(d) => cast.values.push(Some(Self::rescale(d, scale))),
                            None => cast.push_failure(row, column, f.to_string(), ParseErrorKind::InvalidNumber),
                        },
                    }
                }
            }
            DataType::String => {
                for (row, v) in series.str()?.into_iter().enumerate() {
                    match v.map(str::trim) {
                        None | Some("") => cast.values.push(None),
                        Some(text) => match Self::parse_decimal(text) {
                            Some(d) => cast.values.push(Some(Self::rescale(d, scale))),
                            None => cast.push_failure(row, column, text.to_string(), ParseErrorKind::InvalidNumber),
                        },
                    }
                }
            }
            _ => cast.values = vec![None; series.len()],
        }

        Ok(cast)
    }

    fn parse_decimal(text: &str) -> Option<Decimal> {
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
    }

    /// Interpret integers as nanoseconds since the Unix epoch
    pub fn epoch_nanos<I>(values: I) -> Vec<Option<NaiveDateTime>>
    where
        I: IntoIterator<Item = Option<i64>>,
    {
        values
            .into_iter()
            .map(|v| v.map(|nanos| DateTime::from_timestamp_nanos(nanos).naive_utc()))
            .collect()
    }

    /// Parse a date or date-time string; bare dates land on midnight
    pub fn parse_datetime_str(text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    /// Cast a date column to date-times, passing typed columns through
    pub fn to_datetime(series: &Series, column: &'static str) -> PolarsResult<Cast<NaiveDateTime>> {
        let mut cast = Cast::with_capacity(series.len());

        match series.dtype() {
            DataType::Datetime(..) => cast.values = frame::datetime_values(series)?,
            DataType::String => {
                for (row, v) in series.str()?.into_iter().enumerate() {
                    match v {
                        None => cast.values.push(None),
                        Some(text) if text.trim().is_empty() => cast.values.push(None),
                        Some(text) => match Self::parse_datetime_str(text) {
                            Some(dt) => cast.values.push(Some(dt)),
                            None => cast.push_failure(row, column, text.to_string(), ParseErrorKind::InvalidDate),
                        },
                    }
                }
            }
            _ => cast.values = vec![None; series.len()],
        }

        Ok(cast)
    }
}

/// Read one column through `read`, reporting absence or a wrong type as a
/// [`SchemaError`]
pub(crate) fn read_column<'a, T>(
    table: &'a DataFrame,
    name: &str,
    expected: &'static str,
    read: impl FnOnce(&'a Series) -> PolarsResult<T>,
) -> Result<T, SchemaError> {
    let series = table
        .column(name)
        .map_err(|_| SchemaError::MissingColumn(name.to_string()))?;
    read(series).map_err(|_| SchemaError::UnexpectedType {
        column: name.to_string(),
        expected,
        actual: series.dtype().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rescale_pads_to_scale() {
        let d = ColumnTyper::rescale(dec!(200), PRICE_SCALE);
        assert_eq!(d, dec!(200.00));
        assert_eq!(d.scale(), 2);
        assert_eq!(d.to_string(), "200.00");
    }

    #[test]
    fn test_rescale_half_even() {
        assert_eq!(ColumnTyper::rescale(dec!(2.125), 2), dec!(2.12));
        assert_eq!(ColumnTyper::rescale(dec!(2.135), 2), dec!(2.14));
        assert_eq!(ColumnTyper::rescale(dec!(2.375), 2), dec!(2.38));
        assert_eq!(ColumnTyper::rescale(dec!(-2.125), 2), dec!(-2.12));
        assert_eq!(ColumnTyper::rescale(dec!(2.1251), 2), dec!(2.13));
    }

    #[test]
    fn test_float_column_to_decimal() {
        let s = Series::new("open", vec![Some(187.1), None, Some(2.125), Some(3.0)]);
        let cast = ColumnTyper::to_decimal(&s, "open", PRICE_SCALE).unwrap();
        assert!(cast.failures.is_empty());
        assert_eq!(
            cast.values,
            vec![Some(dec!(187.10)), None, Some(dec!(2.12)), Some(dec!(3.00))]
        );
    }

    #[test]
    fn test_non_finite_float_fails_row() {
        let s = Series::new("open", vec![Some(1.0), Some(f64::NAN)]);
        let cast = ColumnTyper::to_decimal(&s, "open", PRICE_SCALE).unwrap();
        assert_eq!(cast.values, vec![Some(dec!(1.00)), None]);
        assert_eq!(cast.failures.len(), 1);
        assert_eq!(cast.failures[0].row, 1);
        assert_eq!(cast.failures[0].kind, ParseErrorKind::InvalidNumber);
    }

    #[test]
    fn test_decimal_column_is_rescaled() {
        let s = frame::decimal_series("open", 3, &[Some(dec!(1.5)), Some(dec!(2.125)), None]).unwrap();
        let cast = ColumnTyper::to_decimal(&s, "open", PRICE_SCALE).unwrap();
        assert_eq!(cast.values, vec![Some(dec!(1.50)), Some(dec!(2.12)), None]);
        for value in cast.values.iter().flatten() {
            assert_eq!(value.scale(), PRICE_SCALE);
        }
    }

    #[test]
    fn test_narrow_integer_column_to_decimal() {
        let s = Series::new("open", vec![Some(7i32), None]);
        let cast = ColumnTyper::to_decimal(&s, "open", PRICE_SCALE).unwrap();
        assert_eq!(cast.values, vec![Some(dec!(7.00)), None]);
    }

    #[test]
    fn test_text_column_to_decimal() {
        let s = Series::new("yield_1_month", vec![Some("5.27"), Some(""), Some("n/a"), Some("1e-2")]);
        let cast = ColumnTyper::to_decimal(&s, "1m", YIELD_SCALE).unwrap();
        assert_eq!(cast.values[0], Some(dec!(5.270000)));
        assert_eq!(cast.values[1], None);
        assert_eq!(cast.values[2], None);
        assert_eq!(cast.values[3], Some(dec!(0.010000)));
        assert_eq!(cast.failures.len(), 1);
        assert_eq!(cast.failures[0].value, "n/a");
    }

    #[test]
    fn test_epoch_zero_is_unix_epoch() {
        let out = ColumnTyper::epoch_nanos([Some(0), None]);
        assert_eq!(out[0], DateTime::from_timestamp(0, 0).map(|dt| dt.naive_utc()));
        assert_eq!(out[1], None);
    }

    #[test]
    fn test_epoch_keeps_nanoseconds() {
        let out = ColumnTyper::epoch_nanos([Some(1_682_083_800_000_000_123)]);
        let dt = out[0].unwrap();
        assert_eq!(dt.and_utc().timestamp_nanos_opt(), Some(1_682_083_800_000_000_123));
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(ColumnTyper::parse_datetime_str("2024-01-02"), Some(midnight));
        assert_eq!(ColumnTyper::parse_datetime_str("2024-01-02 00:00:00"), Some(midnight));
        assert_eq!(ColumnTyper::parse_datetime_str("2024-01-02T00:00:00.000"), Some(midnight));
        assert_eq!(ColumnTyper::parse_datetime_str("01/02/2024"), None);
        assert_eq!(ColumnTyper::parse_datetime_str("2024-13-02"), None);
    }

    #[test]
    fn test_typed_datetime_passes_through() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0);
        let s = frame::datetime_series("date", &[midnight, None]);
        let cast = ColumnTyper::to_datetime(&s, "date").unwrap();
        assert_eq!(cast.values, vec![midnight, None]);
        assert!(cast.failures.is_empty());
    }

    #[test]
    fn test_check_schema() {
        let table = DataFrame::new(vec![
            Series::new("ticker", vec![Some("AAPL")]),
            Series::new("volume", vec![Some(1.0)]),
        ])
        .unwrap();

        assert!(ColumnTyper::check_schema(&table, &[("ticker", Accepts::Utf8)]).is_ok());
        assert!(ColumnTyper::check_schema(&table, &[("volume", Accepts::Numeric)]).is_ok());
        assert!(matches!(
            ColumnTyper::check_schema(&table, &[("volume", Accepts::Int64)]),
            Err(SchemaError::UnexpectedType { .. })
        ));
        assert_eq!(
            ColumnTyper::check_schema(&table, &[("open", Accepts::Numeric)]),
            Err(SchemaError::MissingColumn("open".to_string()))
        );
    }

    proptest! {
        #[test]
        fn prop_price_scale_is_exact(cents in -10_000_000i64..10_000_000i64, frac in 0u32..1000) {
            let raw = cents as f64 / 100.0 + frac as f64 / 100_000.0;
            let s = Series::new("open", vec![Some(raw)]);
            let cast = ColumnTyper::to_decimal(&s, "open", PRICE_SCALE).unwrap();
            prop_assert_eq!(cast.values[0].unwrap().scale(), PRICE_SCALE);
        }

        #[test]
        fn prop_epoch_monotonic(nanos in proptest::collection::vec(0i64..4_000_000_000_000_000_000, 2..50)) {
            let mut nanos = nanos;
            nanos.sort_unstable();
            let out = ColumnTyper::epoch_nanos(nanos.into_iter().map(Some));
            for pair in out.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }
    }
}

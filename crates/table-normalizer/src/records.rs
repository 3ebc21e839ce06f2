//! Typed Row Views of Normalized Tables

use chrono::NaiveDateTime;
use polars::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::columns::{output, TENORS};
use crate::error::SchemaError;
use crate::frame;
use crate::ticker::OptionType;
use crate::typing::read_column;

/// One normalized option aggregate row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionAggregateRecord {
    pub option_ticker: Option<String>,
    pub volume: Option<i64>,
    /// Scale 2
    pub option_price: Option<Decimal>,
    pub timestamp: Option<NaiveDateTime>,
    pub underlying_ticker: Option<String>,
    /// Midnight of the expiration day
    pub expiration_date: Option<NaiveDateTime>,
    pub option_type: Option<OptionType>,
    /// Scale 2
    pub strike_price: Option<Decimal>,
}

/// One normalized stock aggregate row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAggregateRecord {
    pub ticker: Option<String>,
    pub volume: Option<i64>,
    /// Scale 2
    pub price: Option<Decimal>,
    pub timestamp: Option<NaiveDateTime>,
}

/// One normalized treasury curve, yields as fractions at scale 6
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreasuryYieldRecord {
    pub date: Option<NaiveDateTime>,
    #[serde(rename = "1m")]
    pub m1: Option<Decimal>,
    #[serde(rename = "3m")]
    pub m3: Option<Decimal>,
    #[serde(rename = "1y")]
    pub y1: Option<Decimal>,
    #[serde(rename = "2y")]
    pub y2: Option<Decimal>,
    #[serde(rename = "5y")]
    pub y5: Option<Decimal>,
    #[serde(rename = "10y")]
    pub y10: Option<Decimal>,
    #[serde(rename = "30y")]
    pub y30: Option<Decimal>,
}

fn utf8(table: &DataFrame, name: &str) -> Result<Vec<Option<String>>, SchemaError> {
    read_column(table, name, "str", |s| {
        Ok(s.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
    })
}

fn int64(table: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, SchemaError> {
    read_column(table, name, "i64", |s| Ok(s.i64()?.into_iter().collect()))
}

fn decimal(table: &DataFrame, name: &str) -> Result<Vec<Option<Decimal>>, SchemaError> {
    read_column(table, name, "decimal", frame::decimal_values)
}

fn datetime(table: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>, SchemaError> {
    read_column(table, name, "datetime", frame::datetime_values)
}

fn option_types(table: &DataFrame, name: &str) -> Result<Vec<Option<OptionType>>, SchemaError> {
    read_column(table, name, "categorical[CALL,PUT]", |s| {
        Ok(s.categorical()?
            .iter_str()
            .map(|label| label.and_then(|l| l.parse().ok()))
            .collect())
    })
}

impl OptionAggregateRecord {
    /// Read rows back out of an option aggregate transform result
    pub fn from_table(table: &DataFrame) -> Result<Vec<Self>, SchemaError> {
        let mut option_ticker = utf8(table, output::OPTION_TICKER)?;
        let volume = int64(table, output::VOLUME)?;
        let option_price = decimal(table, output::OPTION_PRICE)?;
        let timestamp = datetime(table, output::TIMESTAMP)?;
        let mut underlying = utf8(table, output::UNDERLYING_TICKER)?;
        let expiration = datetime(table, output::EXPIRATION_DATE)?;
        let option_type = option_types(table, output::OPTION_TYPE)?;
        let strike = decimal(table, output::STRIKE_PRICE)?;

        Ok((0..table.height())
            .map(|i| Self {
                option_ticker: option_ticker[i].take(),
                volume: volume[i],
                option_price: option_price[i],
                timestamp: timestamp[i],
                underlying_ticker: underlying[i].take(),
                expiration_date: expiration[i],
                option_type: option_type[i],
                strike_price: strike[i],
            })
            .collect())
    }
}

impl StockAggregateRecord {
    /// Read rows back out of a stock aggregate transform result
    pub fn from_table(table: &DataFrame) -> Result<Vec<Self>, SchemaError> {
        let mut ticker = utf8(table, output::TICKER)?;
        let volume = int64(table, output::VOLUME)?;
        let price = decimal(table, output::PRICE)?;
        let timestamp = datetime(table, output::TIMESTAMP)?;

        Ok((0..table.height())
            .map(|i| Self {
                ticker: ticker[i].take(),
                volume: volume[i],
                price: price[i],
                timestamp: timestamp[i],
            })
            .collect())
    }
}

impl TreasuryYieldRecord {
    /// Read rows back out of a treasury transform result
    pub fn from_table(table: &DataFrame) -> Result<Vec<Self>, SchemaError> {
        let date = datetime(table, output::DATE)?;
        let tenors = TENORS
            .iter()
            .map(|(_, name)| decimal(table, name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((0..table.height())
            .map(|i| Self {
                date: date[i],
                m1: tenors[0][i],
                m3: tenors[1][i],
                y1: tenors[2][i],
                y2: tenors[3][i],
                y5: tenors[4][i],
                y10: tenors[5][i],
                y30: tenors[6][i],
            })
            .collect())
    }

    /// Tenor values short end first
    pub fn curve(&self) -> [Option<Decimal>; 7] {
        [self.m1, self.m3, self.y1, self.y2, self.y5, self.y10, self.y30]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stock_frame(price: Series) -> DataFrame {
        DataFrame::new(vec![
            Series::new(output::TICKER, vec![Some("AAPL")]),
            Series::new(output::VOLUME, vec![Some(1200i64)]),
            price,
            frame::datetime_series(output::TIMESTAMP, &[None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_stock_records() {
        let price = frame::decimal_series(output::PRICE, 2, &[Some(dec!(187.50))]).unwrap();
        let records = StockAggregateRecord::from_table(&stock_frame(price)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ticker.as_deref(), Some("AAPL"));
        assert_eq!(records[0].volume, Some(1200));
        assert_eq!(records[0].price, Some(dec!(187.50)));
        assert_eq!(records[0].timestamp, None);
    }

    #[test]
    fn test_records_require_normalized_types() {
        let price = Series::new(output::PRICE, vec![Some(187.5)]);
        assert!(matches!(
            StockAggregateRecord::from_table(&stock_frame(price)),
            Err(SchemaError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn test_records_missing_column() {
        let table = DataFrame::new(vec![Series::new(output::TICKER, vec![Some("AAPL")])]).unwrap();
        assert_eq!(
            StockAggregateRecord::from_table(&table),
            Err(SchemaError::MissingColumn(output::VOLUME.to_string()))
        );
    }

    #[test]
    fn test_option_type_serializes_upper() {
        let json = serde_json::to_string(&OptionType::Put).unwrap();
        assert_eq!(json, "\"PUT\"");
    }
}

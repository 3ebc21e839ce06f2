//! Option Ticker Decoding
//!
//! Splits Polygon-style composite option tickers such as
//! `O:TSLA230421C00200000` into underlying symbol, expiration date,
//! call/put flag and strike price.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{CategoricalOrdering, DataType, NamedFrom, PolarsResult, Series, StringChunked};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{ParseErrorKind, RowParseError};
use crate::typing::{ColumnTyper, PRICE_SCALE};

/// Symbol, date digits, flag, strike digits
const TICKER_PATTERN: &str = r"^O:([A-Za-z]+)([0-9]+)([A-Za-z])([0-9]+)$";

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TICKER_PATTERN).expect("ticker pattern compiles"));

/// Strike digits carry three implied decimal places
const STRIKE_IMPLIED_SCALE: u32 = 3;
const STRIKE_DIGITS: usize = 8;
const EXPIRATION_DIGITS: usize = 6;
const EXPIRATION_CENTURY: i32 = 2000;

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Map the ticker flag character
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'C' => Some(OptionType::Call),
            'P' => Some(OptionType::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "CALL",
            OptionType::Put => "PUT",
        }
    }

    /// Categorical series holding only `CALL` and `PUT`
    pub fn series(name: &str, values: &[Option<OptionType>]) -> PolarsResult<Series> {
        let labels: Vec<Option<&str>> = values.iter().map(|v| v.map(|t| t.as_str())).collect();
        Series::new(name, labels).cast(&DataType::Categorical(None, CategoricalOrdering::Physical))
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CALL" => Ok(OptionType::Call),
            "PUT" => Ok(OptionType::Put),
            _ => Err(ParseErrorKind::InvalidOptionType),
        }
    }
}

/// Fields decoded from one composite ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedTicker {
    /// Uppercase underlying symbol
    pub underlying: String,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    /// Strike at scale 2
    pub strike_price: Decimal,
}

/// Decoded columns for a whole batch, row-aligned with the input
#[derive(Debug, Clone, Default)]
pub struct TickerColumns {
    pub underlying: Vec<Option<String>>,
    pub expiration: Vec<Option<NaiveDateTime>>,
    pub option_type: Vec<Option<OptionType>>,
    pub strike_price: Vec<Option<Decimal>>,
    pub failures: Vec<RowParseError>,
}

impl TickerColumns {
    fn with_capacity(n: usize) -> Self {
        Self {
            underlying: Vec::with_capacity(n),
            expiration: Vec::with_capacity(n),
            option_type: Vec::with_capacity(n),
            strike_price: Vec::with_capacity(n),
            failures: Vec::new(),
        }
    }

    fn push(&mut self, decoded: Option<DecodedTicker>) {
        match decoded {
            Some(d) => {
                self.underlying.push(Some(d.underlying));
                self.expiration.push(d.expiration.and_hms_opt(0, 0, 0));
                self.option_type.push(Some(d.option_type));
                self.strike_price.push(Some(d.strike_price));
            }
            None => {
                self.underlying.push(None);
                self.expiration.push(None);
                self.option_type.push(None);
                self.strike_price.push(None);
            }
        }
    }
}

/// Decoder for composite option tickers
pub struct OptionTickerParser;

impl OptionTickerParser {
    /// Decode a single ticker
    pub fn decode(ticker: &str) -> Result<DecodedTicker, ParseErrorKind> {
        let caps = TICKER_RE
            .captures(ticker)
            .ok_or(ParseErrorKind::MalformedTicker)?;
        let (symbol, date_digits, flag, strike_digits) = (&caps[1], &caps[2], &caps[3], &caps[4]);

        let option_type = flag
            .chars()
            .next()
            .and_then(OptionType::from_flag)
            .ok_or(ParseErrorKind::InvalidOptionType)?;

        let expiration = Self::decode_expiration(date_digits)?;

        if strike_digits.len() != STRIKE_DIGITS {
            return Err(ParseErrorKind::MalformedTicker);
        }
        let strike_price = strike_digits
            .parse::<i64>()
            .map(|raw| ColumnTyper::rescale(Decimal::new(raw, STRIKE_IMPLIED_SCALE), PRICE_SCALE))
            .map_err(|_| ParseErrorKind::MalformedTicker)?;

        Ok(DecodedTicker {
            underlying: symbol.to_ascii_uppercase(),
            expiration,
            option_type,
            strike_price,
        })
    }

    /// `YYMMDD` in the 21st century. The feed sometimes prefixes a stray
    /// digit, giving 7 characters; the first one is dropped.
    fn decode_expiration(digits: &str) -> Result<NaiveDate, ParseErrorKind> {
        let digits = if digits.len() == EXPIRATION_DIGITS + 1 {
            &digits[1..]
        } else {
            digits
        };
        if digits.len() != EXPIRATION_DIGITS {
            return Err(ParseErrorKind::InvalidExpiration);
        }

        let field = |range: std::ops::Range<usize>| {
            digits[range]
                .parse::<u32>()
                .map_err(|_| ParseErrorKind::InvalidExpiration)
        };
        let year = EXPIRATION_CENTURY + field(0..2)? as i32;
        let month = field(2..4)?;
        let day = field(4..6)?;

        NaiveDate::from_ymd_opt(year, month, day).ok_or(ParseErrorKind::InvalidExpiration)
    }

    /// Decode every ticker of a column. Null tickers give null fields;
    /// undecodable ones give null fields and a recorded failure.
    pub fn decode_column(tickers: &StringChunked, column: &'static str) -> TickerColumns {
        let mut out = TickerColumns::with_capacity(tickers.len());

        for (row, ticker) in tickers.into_iter().enumerate() {
            let Some(ticker) = ticker else {
                out.push(None);
                continue;
            };
            match Self::decode(ticker) {
                Ok(decoded) => out.push(Some(decoded)),
                Err(kind) => {
                    out.push(None);
                    out.failures.push(RowParseError {
                        row,
                        column,
                        value: ticker.to_string(),
                        kind,
                    });
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_call() {
        let d = OptionTickerParser::decode("O:TSLA230421C00200000").unwrap();
        assert_eq!(d.underlying, "TSLA");
        assert_eq!(d.expiration, NaiveDate::from_ymd_opt(2023, 4, 21).unwrap());
        assert_eq!(d.option_type, OptionType::Call);
        assert_eq!(d.strike_price, dec!(200.00));
        assert_eq!(d.strike_price.to_string(), "200.00");
    }

    #[test]
    fn test_decode_put() {
        let d = OptionTickerParser::decode("O:SPY240119P00475500").unwrap();
        assert_eq!(d.underlying, "SPY");
        assert_eq!(d.option_type, OptionType::Put);
        assert_eq!(d.strike_price, dec!(475.50));
    }

    #[test]
    fn test_seven_digit_expiration_quirk() {
        let quirky = OptionTickerParser::decode("O:AAPL1230421C00150000").unwrap();
        let clean = OptionTickerParser::decode("O:AAPL230421C00150000").unwrap();
        assert_eq!(quirky, clean);
    }

    #[test]
    fn test_invalid_flag() {
        assert_eq!(
            OptionTickerParser::decode("O:TSLA230421X00200000"),
            Err(ParseErrorKind::InvalidOptionType)
        );
    }

    #[test]
    fn test_invalid_calendar_date() {
        assert_eq!(
            OptionTickerParser::decode("O:TSLA231321C00200000"),
            Err(ParseErrorKind::InvalidExpiration)
        );
        assert_eq!(
            OptionTickerParser::decode("O:TSLA230230C00200000"),
            Err(ParseErrorKind::InvalidExpiration)
        );
        assert_eq!(
            OptionTickerParser::decode("O:TSLA2304C00200000"),
            Err(ParseErrorKind::InvalidExpiration)
        );
    }

    #[test]
    fn test_malformed() {
        for bad in ["TSLA230421C00200000", "O:230421C00200000", "O:TSLA230421C002000", "", "O:TSLA230421C00200000X"] {
            assert_eq!(
                OptionTickerParser::decode(bad),
                Err(ParseErrorKind::MalformedTicker),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_strike_rounds_half_even() {
        let d = OptionTickerParser::decode("O:XYZ230421C00012345").unwrap();
        assert_eq!(d.strike_price, dec!(12.34));
        let d = OptionTickerParser::decode("O:XYZ230421C00012355").unwrap();
        assert_eq!(d.strike_price, dec!(12.36));
        assert_eq!(d.strike_price.scale(), 2);
    }

    #[test]
    fn test_symbol_uppercased() {
        let d = OptionTickerParser::decode("O:brkb230421C00300000").unwrap();
        assert_eq!(d.underlying, "BRKB");
    }

    #[test]
    fn test_decode_column() {
        let tickers = Series::new(
            "option_ticker",
            vec![Some("O:TSLA230421C00200000"), None, Some("garbage")],
        );
        let cols = OptionTickerParser::decode_column(tickers.str().unwrap(), "option_ticker");
        assert_eq!(cols.underlying, vec![Some("TSLA".to_string()), None, None]);
        assert_eq!(cols.option_type, vec![Some(OptionType::Call), None, None]);
        assert_eq!(cols.failures.len(), 1);
        assert_eq!(cols.failures[0].row, 2);
        assert_eq!(cols.failures[0].kind, ParseErrorKind::MalformedTicker);
    }

    #[test]
    fn test_option_type_series() {
        let s = OptionType::series(
            "option_type",
            &[Some(OptionType::Put), None, Some(OptionType::Call)],
        )
        .unwrap();
        assert!(matches!(s.dtype(), DataType::Categorical(..)));
        let labels: Vec<Option<&str>> = s.categorical().unwrap().iter_str().collect();
        assert_eq!(labels, vec![Some("PUT"), None, Some("CALL")]);
    }

    #[test]
    fn test_option_type_round_trip_names() {
        assert_eq!("PUT".parse::<OptionType>(), Ok(OptionType::Put));
        assert_eq!(OptionType::Call.to_string(), "CALL");
        assert!("call".parse::<OptionType>().is_err());
    }

    proptest! {
        #[test]
        fn prop_leading_digit_is_ignored(
            symbol in "[A-Z]{1,5}",
            yy in 0u32..100,
            mm in 1u32..=12,
            dd in 1u32..=28,
            stray in 0u32..10,
            flag in prop::sample::select(vec!['C', 'P']),
            strike in 0u32..100_000_000,
        ) {
            let clean = format!("O:{symbol}{yy:02}{mm:02}{dd:02}{flag}{strike:08}");
            let quirky = format!("O:{symbol}{stray}{yy:02}{mm:02}{dd:02}{flag}{strike:08}");
            let a = OptionTickerParser::decode(&clean).unwrap();
            let b = OptionTickerParser::decode(&quirky).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.strike_price.scale(), PRICE_SCALE);
        }
    }
}

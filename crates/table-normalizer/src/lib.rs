//! Market-Data Table Normalization
//!
//! Turns raw exchange tables into a canonical schema: stable column names,
//! fixed-point prices and yields, nanosecond date-times, decoded option
//! tickers and median-imputed yield curves.
//!
//! Batches are polars `DataFrame`s. Three transforms are provided, each a
//! pure function of one batch:
//! - option aggregates: decode composite tickers, type price and timestamp
//! - stock aggregates: type price and timestamp
//! - treasury yields: percent to fraction, fill gaps with the batch median

mod config;
mod error;
pub mod frame;
mod imputer;
mod records;
mod ticker;
mod transform;
mod typing;

pub use config::{NormalizerConfig, ParseErrorPolicy};
pub use error::{NormalizeError, ParseErrorKind, RowParseError, SchemaError};
pub use imputer::{ImputationOutcome, TenorImputation, YieldImputer};
pub use records::{OptionAggregateRecord, StockAggregateRecord, TreasuryYieldRecord};
pub use ticker::{DecodedTicker, OptionTickerParser, OptionType, TickerColumns};
pub use transform::{
    option_aggregates, stock_aggregates, treasury_yields, Normalized, TableNormalizer,
    TransformKind, TransformReport,
};
pub use typing::{Accepts, Cast, ColumnTyper, PRICE_SCALE, YIELD_SCALE};

pub use rust_decimal::Decimal;

/// Column names
pub mod columns {
    /// Raw exchange input columns
    pub mod raw {
        pub const TICKER: &str = "ticker";
        pub const VOLUME: &str = "volume";
        pub const OPEN: &str = "open";
        pub const WINDOW_START: &str = "window_start";
        pub const DATE: &str = "date";
        pub const YIELD_1_MONTH: &str = "yield_1_month";
        pub const YIELD_3_MONTH: &str = "yield_3_month";
        pub const YIELD_1_YEAR: &str = "yield_1_year";
        pub const YIELD_2_YEAR: &str = "yield_2_year";
        pub const YIELD_5_YEAR: &str = "yield_5_year";
        pub const YIELD_10_YEAR: &str = "yield_10_year";
        pub const YIELD_30_YEAR: &str = "yield_30_year";
    }

    /// Canonical output columns
    pub mod output {
        pub const OPTION_TICKER: &str = "option_ticker";
        pub const TICKER: &str = "ticker";
        pub const VOLUME: &str = "volume";
        pub const OPTION_PRICE: &str = "option_price";
        pub const PRICE: &str = "price";
        pub const TIMESTAMP: &str = "timestamp";
        pub const UNDERLYING_TICKER: &str = "underlying_ticker";
        pub const EXPIRATION_DATE: &str = "expiration_date";
        pub const OPTION_TYPE: &str = "option_type";
        pub const STRIKE_PRICE: &str = "strike_price";
        pub const DATE: &str = "date";
    }

    /// Raw tenor column to canonical tenor name, short end first
    pub const TENORS: [(&str, &str); 7] = [
        (raw::YIELD_1_MONTH, "1m"),
        (raw::YIELD_3_MONTH, "3m"),
        (raw::YIELD_1_YEAR, "1y"),
        (raw::YIELD_2_YEAR, "2y"),
        (raw::YIELD_5_YEAR, "5y"),
        (raw::YIELD_10_YEAR, "10y"),
        (raw::YIELD_30_YEAR, "30y"),
    ];
}

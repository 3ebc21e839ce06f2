//! Transform Entry Points
//!
//! Each transform takes a raw batch by reference and returns a new canonical
//! batch plus a report. Schema problems fail the call before any row is
//! touched; row decode failures follow the configured [`ParseErrorPolicy`].

use polars::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::columns::{output, raw, TENORS};
use crate::config::{NormalizerConfig, ParseErrorPolicy};
use crate::error::{NormalizeError, RowParseError};
use crate::frame;
use crate::imputer::{ImputationOutcome, TenorImputation, YieldImputer};
use crate::ticker::{OptionTickerParser, OptionType};
use crate::typing::{Accepts, ColumnTyper, PRICE_SCALE, YIELD_SCALE};

/// Which transform produced a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    OptionAggregates,
    StockAggregates,
    TreasuryYields,
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::OptionAggregates => write!(f, "option aggregates"),
            TransformKind::StockAggregates => write!(f, "stock aggregates"),
            TransformKind::TreasuryYields => write!(f, "treasury yields"),
        }
    }
}

/// Summary of one transform call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformReport {
    pub kind: TransformKind,
    /// Rows in and out; rows are never dropped
    pub rows: usize,
    /// Rows kept with null derived fields, sorted by row
    pub parse_failures: Vec<RowParseError>,
    /// Per-tenor imputation results, empty except for treasury yields
    pub imputation: Vec<TenorImputation>,
}

/// A normalized batch and what happened while producing it
#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: DataFrame,
    pub report: TransformReport,
}

/// The three table normalization transforms
#[derive(Debug, Clone, Default)]
pub struct TableNormalizer {
    config: NormalizerConfig,
}

impl TableNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Rename, type and decode a raw option aggregate batch
    pub fn option_aggregates(&self, table: &DataFrame) -> Result<Normalized, NormalizeError> {
        let base = Self::select_aggregates(table, output::OPTION_TICKER, output::OPTION_PRICE)?;
        let mut failures = Vec::new();

        let tickers = base.column(output::OPTION_TICKER)?.str()?;
        let decoded = OptionTickerParser::decode_column(tickers, output::OPTION_TICKER);
        debug!("Decoded {} option tickers", base.height());

        let mut out = Self::type_aggregates(base, output::OPTION_PRICE, &mut failures)?;
        failures.extend(decoded.failures);
        self.apply_policy(&mut failures)?;

        out.with_column(Series::new(output::UNDERLYING_TICKER, decoded.underlying))?
            .with_column(frame::datetime_series(output::EXPIRATION_DATE, &decoded.expiration))?
            .with_column(OptionType::series(output::OPTION_TYPE, &decoded.option_type)?)?
            .with_column(frame::decimal_series(
                output::STRIKE_PRICE,
                PRICE_SCALE,
                &decoded.strike_price,
            )?)?;

        Ok(self.finish(TransformKind::OptionAggregates, out, failures, Vec::new()))
    }

    /// Rename and type a raw stock aggregate batch (minute or day bars).
    ///
    /// An already normalized batch has no `open`/`window_start` columns and is
    /// rejected with [`SchemaError::MissingColumn`](crate::SchemaError::MissingColumn).
    pub fn stock_aggregates(&self, table: &DataFrame) -> Result<Normalized, NormalizeError> {
        let base = Self::select_aggregates(table, output::TICKER, output::PRICE)?;
        let mut failures = Vec::new();

        let out = Self::type_aggregates(base, output::PRICE, &mut failures)?;
        self.apply_policy(&mut failures)?;

        Ok(self.finish(TransformKind::StockAggregates, out, failures, Vec::new()))
    }

    /// Rename tenors, convert percentages to fractions and fill gaps
    pub fn treasury_yields(&self, table: &DataFrame) -> Result<Normalized, NormalizeError> {
        let mut required = vec![(raw::DATE, Accepts::Temporal)];
        required.extend(TENORS.iter().map(|(from, _)| (*from, Accepts::Numeric)));
        ColumnTyper::check_schema(table, &required)?;

        let mut base = table.select(required.iter().map(|(name, _)| *name))?;
        for (from, to) in TENORS {
            base.rename(from, to)?;
        }
        let mut failures = Vec::new();

        let dates = ColumnTyper::to_datetime(base.column(output::DATE)?, output::DATE)?;
        failures.extend(dates.failures);

        let imputer = YieldImputer::new(YIELD_SCALE);
        let mut scaled = Vec::with_capacity(TENORS.len());
        let mut imputation = Vec::with_capacity(TENORS.len());

        for (_, tenor) in TENORS {
            let cast = ColumnTyper::to_decimal(base.column(tenor)?, tenor, YIELD_SCALE)?;
            failures.extend(cast.failures);

            let fractions: Vec<Option<Decimal>> = cast
                .values
                .into_iter()
                .map(|v| v.map(|pct| ColumnTyper::rescale(pct / Decimal::ONE_HUNDRED, YIELD_SCALE)))
                .collect();

            let (values, outcome) = if self.config.impute_missing_yields {
                imputer.impute(tenor, fractions)
            } else {
                let missing = fractions.iter().filter(|v| v.is_none()).count();
                let outcome = match missing {
                    0 => ImputationOutcome::Complete,
                    missing => ImputationOutcome::Skipped { missing },
                };
                (fractions, outcome)
            };

            scaled.push(frame::decimal_series(tenor, YIELD_SCALE, &values)?);
            imputation.push(TenorImputation { column: tenor, outcome });
        }
        self.apply_policy(&mut failures)?;

        base.with_column(frame::datetime_series(output::DATE, &dates.values))?;
        for series in scaled {
            base.with_column(series)?;
        }

        Ok(self.finish(TransformKind::TreasuryYields, base, failures, imputation))
    }

    /// Check, select and rename the four aggregate columns
    fn select_aggregates(
        table: &DataFrame,
        ticker_name: &str,
        price_name: &str,
    ) -> Result<DataFrame, NormalizeError> {
        ColumnTyper::check_schema(
            table,
            &[
                (raw::TICKER, Accepts::Utf8),
                (raw::VOLUME, Accepts::Int64),
                (raw::OPEN, Accepts::Numeric),
                (raw::WINDOW_START, Accepts::Int64),
            ],
        )?;

        let mut base = table.select([raw::TICKER, raw::VOLUME, raw::OPEN, raw::WINDOW_START])?;
        base.rename(raw::TICKER, ticker_name)?
            .rename(raw::OPEN, price_name)?
            .rename(raw::WINDOW_START, output::TIMESTAMP)?;
        Ok(base)
    }

    /// Price to scale-2 decimal, epoch nanoseconds to date-time
    fn type_aggregates(
        mut base: DataFrame,
        price_name: &'static str,
        failures: &mut Vec<RowParseError>,
    ) -> Result<DataFrame, NormalizeError> {
        let price = ColumnTyper::to_decimal(base.column(price_name)?, price_name, PRICE_SCALE)?;
        failures.extend(price.failures);

        let timestamps = ColumnTyper::epoch_nanos(base.column(output::TIMESTAMP)?.i64()?);

        base.with_column(frame::decimal_series(price_name, PRICE_SCALE, &price.values)?)?
            .with_column(frame::datetime_series(output::TIMESTAMP, &timestamps))?;
        Ok(base)
    }

    /// Fail the batch or keep going, per configuration
    fn apply_policy(&self, failures: &mut Vec<RowParseError>) -> Result<(), NormalizeError> {
        failures.sort_by_key(|f| f.row);
        match (self.config.on_parse_error, failures.first()) {
            (_, None) => Ok(()),
            (ParseErrorPolicy::FailBatch, Some(first)) => {
                warn!("Rejecting batch: {} rows failed to parse, first: {}", failures.len(), first);
                Err(first.clone().into())
            }
            (ParseErrorPolicy::NullAndContinue, Some(_)) => {
                for failure in failures.iter() {
                    warn!("{}", failure);
                }
                Ok(())
            }
        }
    }

    fn finish(
        &self,
        kind: TransformKind,
        table: DataFrame,
        parse_failures: Vec<RowParseError>,
        imputation: Vec<TenorImputation>,
    ) -> Normalized {
        info!(
            "Normalized {} {} rows ({} parse failures)",
            table.height(),
            kind,
            parse_failures.len()
        );
        let report = TransformReport {
            kind,
            rows: table.height(),
            parse_failures,
            imputation,
        };
        Normalized { table, report }
    }
}

impl TransformReport {
    /// Tenors left with missing values
    pub fn unimputed(&self) -> impl Iterator<Item = &TenorImputation> {
        self.imputation.iter().filter(|t| t.outcome.has_missing())
    }
}

/// [`TableNormalizer::option_aggregates`] with the default configuration
pub fn option_aggregates(table: &DataFrame) -> Result<Normalized, NormalizeError> {
    TableNormalizer::default().option_aggregates(table)
}

/// [`TableNormalizer::stock_aggregates`] with the default configuration
pub fn stock_aggregates(table: &DataFrame) -> Result<Normalized, NormalizeError> {
    TableNormalizer::default().stock_aggregates(table)
}

/// [`TableNormalizer::treasury_yields`] with the default configuration
pub fn treasury_yields(table: &DataFrame) -> Result<Normalized, NormalizeError> {
    TableNormalizer::default().treasury_yields(table)
}

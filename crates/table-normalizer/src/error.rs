//! Normalization Error Types

use polars::prelude::{DataType, PolarsError};
use serde::Serialize;
use thiserror::Error;

/// Errors that fail a whole transform call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// Input table does not have the required shape
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A row could not be decoded and the batch policy is to fail
    #[error(transparent)]
    Parse(#[from] RowParseError),

    /// Dataframe operation failed while assembling output
    #[error("Frame error: {0}")]
    Frame(String),
}

impl From<PolarsError> for NormalizeError {
    fn from(err: PolarsError) -> Self {
        NormalizeError::Frame(err.to_string())
    }
}

/// Input table shape problems, detected before any row is processed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Required column absent
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Required column present with an unsupported type
    #[error("Column {column} has type {actual}, expected {expected}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        actual: DataType,
    },
}

/// Why a single cell failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseErrorKind {
    /// Ticker does not follow `O:<SYM><YYMMDD><C|P><strike>`
    MalformedTicker,
    /// Date digits do not form a calendar date
    InvalidExpiration,
    /// Call/put flag is neither `C` nor `P`
    InvalidOptionType,
    /// Date string in none of the accepted layouts
    InvalidDate,
    /// Numeric text that is not a decimal literal
    InvalidNumber,
}

/// A row-scoped decode failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("Row {row}: cannot parse {column} value {value:?} ({kind:?})")]
pub struct RowParseError {
    /// Zero-based input row index
    pub row: usize,
    pub column: &'static str,
    pub value: String,
    pub kind: ParseErrorKind,
}

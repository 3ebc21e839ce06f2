//! CSV Loading and Writing

use anyhow::{Context, Result};
use polars::prelude::*;
use std::io::{self, Cursor};
use std::path::Path;
use table_normalizer::frame;
use tracing::debug;

use crate::TableKind;

/// Storage type of a raw CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawType {
    Text,
    Integer,
    Float,
}

/// Fixed input types per transform; unknown columns load as text
fn raw_type(kind: TableKind, column: &str) -> RawType {
    match (kind, column) {
        (TableKind::Option | TableKind::Stock, "volume" | "window_start") => RawType::Integer,
        (TableKind::Option | TableKind::Stock, "open") => RawType::Float,
        (TableKind::Treasury, name) if name.starts_with("yield_") => RawType::Float,
        _ => RawType::Text,
    }
}

/// Every column as text; typing happens in [`apply_raw_types`]
fn text_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
}

/// Load a CSV file into a table
pub fn read_table(path: &Path, kind: TableKind) -> Result<DataFrame> {
    let table = text_options()
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("reading CSV file {}", path.display()))?;
    apply_raw_types(table, kind).with_context(|| format!("typing CSV file {}", path.display()))
}

/// Load CSV from memory; empty cells become nulls
pub fn read_table_from(data: &[u8], kind: TableKind) -> Result<DataFrame> {
    let table = text_options()
        .into_reader_with_file_handle(Cursor::new(data))
        .finish()
        .context("parsing CSV")?;
    apply_raw_types(table, kind)
}

/// Strictly cast numeric columns; a non-numeric cell fails the load
fn apply_raw_types(mut table: DataFrame, kind: TableKind) -> Result<DataFrame> {
    let names: Vec<String> = table
        .get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    for name in &names {
        let dtype = match raw_type(kind, name) {
            RawType::Text => continue,
            RawType::Integer => DataType::Int64,
            RawType::Float => DataType::Float64,
        };
        let typed = table
            .column(name)?
            .strict_cast(&dtype)
            .with_context(|| format!("column {} is not {}", name, dtype))?;
        table.with_column(typed)?;
    }

    debug!("Loaded {} rows x {} columns", table.height(), table.width());
    Ok(table)
}

/// Write a table as CSV with a header row
pub fn write_table(path: &Path, table: &DataFrame) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating CSV file {}", path.display()))?;
    write_table_to(file, table).with_context(|| format!("writing CSV file {}", path.display()))
}

/// Decimals keep their trailing zeros; date-times print as
/// `YYYY-MM-DD HH:MM:SS[.f]`; nulls are empty cells
pub fn write_table_to<W: io::Write>(writer: W, table: &DataFrame) -> Result<()> {
    let columns = table
        .get_columns()
        .iter()
        .map(render_column)
        .collect::<Result<Vec<_>>>()?;
    let mut text = DataFrame::new(columns)?;

    CsvWriter::new(writer).include_header(true).finish(&mut text)?;
    Ok(())
}

fn render_column(series: &Series) -> Result<Series> {
    let rendered: Vec<Option<String>> = match series.dtype() {
        DataType::Decimal(..) => frame::decimal_values(series)?
            .into_iter()
            .map(|v| v.map(|d| d.to_string()))
            .collect(),
        DataType::Datetime(..) => frame::datetime_values(series)?
            .into_iter()
            .map(|v| v.map(|dt| dt.to_string()))
            .collect(),
        DataType::Categorical(..) => return Ok(series.cast(&DataType::String)?),
        _ => return Ok(series.clone()),
    };
    Ok(Series::new(series.name(), rendered))
}

//! Batch Median Imputation for Yield Curves

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::typing::ColumnTyper;

/// What happened to the missing values of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImputationOutcome {
    /// Nothing was missing
    Complete,
    /// `filled` cells were replaced by the batch median
    Imputed { filled: usize, median: Decimal },
    /// Every cell was missing so no median exists; cells stay missing
    Undefined { missing: usize },
    /// Imputation disabled; cells stay missing
    Skipped { missing: usize },
}

impl ImputationOutcome {
    /// Whether the column still has missing cells
    pub fn has_missing(&self) -> bool {
        matches!(
            self,
            ImputationOutcome::Undefined { .. } | ImputationOutcome::Skipped { .. }
        )
    }
}

/// Imputation result for a named tenor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenorImputation {
    pub column: &'static str,
    pub outcome: ImputationOutcome,
}

/// Fills missing values with the median of the values present in the same batch
pub struct YieldImputer {
    /// Scale the median is rounded to
    scale: u32,
}

impl YieldImputer {
    pub fn new(scale: u32) -> Self {
        Self { scale }
    }

    /// Median of the non-missing values, or `None` when all are missing.
    /// Even counts average the two middle values.
    pub fn median(&self, values: &[Option<Decimal>]) -> Option<Decimal> {
        let mut present: Vec<Decimal> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }

        present.sort_unstable();
        let mid = present.len() / 2;
        let median = if present.len() % 2 == 1 {
            present[mid]
        } else {
            (present[mid - 1] + present[mid]) / Decimal::TWO
        };
        Some(ColumnTyper::rescale(median, self.scale))
    }

    /// Replace every missing value in the column with its batch median
    pub fn impute(
        &self,
        column: &'static str,
        mut values: Vec<Option<Decimal>>,
    ) -> (Vec<Option<Decimal>>, ImputationOutcome) {
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing == 0 {
            return (values, ImputationOutcome::Complete);
        }

        let Some(median) = self.median(&values) else {
            warn!("Column {} has no values in batch; {} cells left missing", column, missing);
            return (values, ImputationOutcome::Undefined { missing });
        };

        for v in values.iter_mut().filter(|v| v.is_none()) {
            *v = Some(median);
        }
        debug!("Imputed {} missing {} values with median {}", missing, column, median);

        (
            values,
            ImputationOutcome::Imputed {
                filled: missing,
                median,
            },
        )
    }
}

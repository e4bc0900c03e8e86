use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellRef, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

/// Invalid worksheet dimension limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitsError {
    #[error("worksheet must allow at least one row and one column")]
    Empty,
    #[error("row limit {0} exceeds Excel's maximum of {EXCEL_MAX_ROWS}")]
    TooManyRows(u32),
    #[error("column limit {0} exceeds Excel's maximum of {EXCEL_MAX_COLS}")]
    TooManyCols(u32),
}

/// Worksheet dimension limits consulted by every bounds check.
///
/// Defaults to Excel's grid (1,048,576 rows by 16,384 columns). Smaller limits
/// are useful for tests and for embedders that want a bounded sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSheetLimits")]
pub struct SheetLimits {
    /// Number of addressable rows; valid rows are `0..max_rows`.
    pub max_rows: u32,
    /// Number of addressable columns; valid columns are `0..max_cols`.
    pub max_cols: u32,
}

/// Unvalidated wire form of [`SheetLimits`]. Missing fields take Excel's defaults.
#[derive(Deserialize)]
#[serde(default)]
struct RawSheetLimits {
    max_rows: u32,
    max_cols: u32,
}

impl Default for RawSheetLimits {
    fn default() -> Self {
        let SheetLimits { max_rows, max_cols } = SheetLimits::default();
        Self { max_rows, max_cols }
    }
}

impl TryFrom<RawSheetLimits> for SheetLimits {
    type Error = LimitsError;

    fn try_from(raw: RawSheetLimits) -> Result<Self, Self::Error> {
        SheetLimits::new(raw.max_rows, raw.max_cols)
    }
}

impl Default for SheetLimits {
    fn default() -> Self {
        Self {
            max_rows: EXCEL_MAX_ROWS,
            max_cols: EXCEL_MAX_COLS,
        }
    }
}

impl SheetLimits {
    pub fn new(max_rows: u32, max_cols: u32) -> Result<Self, LimitsError> {
        let limits = Self { max_rows, max_cols };
        limits.validate()?;
        Ok(limits)
    }

    /// Check the limits fit the packed cell-key space.
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.max_rows == 0 || self.max_cols == 0 {
            return Err(LimitsError::Empty);
        }
        if self.max_rows > EXCEL_MAX_ROWS {
            return Err(LimitsError::TooManyRows(self.max_rows));
        }
        if self.max_cols > EXCEL_MAX_COLS {
            return Err(LimitsError::TooManyCols(self.max_cols));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, cell: CellRef) -> bool {
        cell.row < self.max_rows && cell.col < self.max_cols
    }

    /// Last addressable row (0-indexed).
    #[must_use]
    pub fn last_row(&self) -> u32 {
        self.max_rows - 1
    }

    /// Last addressable column (0-indexed).
    #[must_use]
    pub fn last_col(&self) -> u32 {
        self.max_cols - 1
    }
}

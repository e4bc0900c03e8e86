use thiserror::Error;

use crate::value::text_eq_case_insensitive;
use crate::{CellRef, EditAxis, Range, RangeCollapsed};
use serde::{Deserialize, Serialize};

mod columns;
mod editor;

pub use columns::{TableColumn, TableColumnSet, TotalsRowFunction, UnknownTotalsRowFunction};
pub use editor::TableEditor;

/// Errors that can occur when creating, editing or shifting around a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table name cannot be empty")]
    EmptyName,
    #[error("table name exceeds Excel's 255 character limit")]
    NameTooLong,
    #[error("table name must start with an ASCII letter or '_'")]
    InvalidStartChar,
    #[error("table name contains invalid character '{ch}'")]
    InvalidChar { ch: char },
    #[error("table name conflicts with a cell or range reference")]
    ConflictsWithCellReference,
    #[error("table name is reserved")]
    ReservedName,
    #[error("table name already exists on the worksheet")]
    DuplicateName,
    #[error("table not found")]
    TableNotFound,
    #[error("table range is too small for header/totals row settings")]
    InvalidRange,
    #[error("table range overlaps table '{name}'")]
    OverlapsTable { name: String },
    #[error("start offset must not be negative (got {0})")]
    NegativeOffset(i64),
    #[error("count must not be negative (got {0})")]
    NegativeCount(i64),
    #[error("{count} {axis} at offset {offset} exceed the table bounds ({available} available)")]
    ExceedsTableBounds {
        axis: EditAxis,
        offset: u32,
        count: u32,
        available: u32,
    },
    #[error("table range would collapse below its minimum size")]
    RangeCollapsed,
    #[error("operation exceeds the worksheet limits")]
    ExceedsSheetLimit,
    #[error("column index {index} (count {count}) is out of range for {len} columns")]
    ColumnIndexOutOfRange {
        index: usize,
        count: usize,
        len: usize,
    },
    #[error("cannot remove all columns of a table; delete the table instead")]
    CannotRemoveAllColumns,
    #[error("table has been deleted")]
    TableDeleted,
    #[error("operation would break table '{name}'")]
    ShiftsProtectedTable { name: String },
    #[error("the row below the table is not empty")]
    TotalsRowOccupied,
}

/// Coarse classification of [`TableError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableErrorKind {
    /// The request itself is malformed (negative offsets, bad names).
    Argument,
    /// The request is well-formed but would violate a table or sheet invariant.
    InvalidOperation,
}

impl TableError {
    pub fn kind(&self) -> TableErrorKind {
        match self {
            TableError::EmptyName
            | TableError::NameTooLong
            | TableError::InvalidStartChar
            | TableError::InvalidChar { .. }
            | TableError::ConflictsWithCellReference
            | TableError::ReservedName
            | TableError::DuplicateName
            | TableError::TableNotFound
            | TableError::NegativeOffset(_)
            | TableError::NegativeCount(_) => TableErrorKind::Argument,
            TableError::InvalidRange
            | TableError::OverlapsTable { .. }
            | TableError::ExceedsTableBounds { .. }
            | TableError::RangeCollapsed
            | TableError::ExceedsSheetLimit
            | TableError::ColumnIndexOutOfRange { .. }
            | TableError::CannotRemoveAllColumns
            | TableError::TableDeleted
            | TableError::ShiftsProtectedTable { .. }
            | TableError::TotalsRowOccupied => TableErrorKind::InvalidOperation,
        }
    }

    pub fn is_argument_error(&self) -> bool {
        self.kind() == TableErrorKind::Argument
    }

    pub fn is_invalid_operation(&self) -> bool {
        self.kind() == TableErrorKind::InvalidOperation
    }
}

impl From<RangeCollapsed> for TableError {
    fn from(_: RangeCollapsed) -> Self {
        TableError::RangeCollapsed
    }
}

/// Identifier for a table within a worksheet.
///
/// Tables can be referred to by either their name or stable `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableIdentifier {
    Name(String),
    Id(u32),
}

impl From<u32> for TableIdentifier {
    fn from(value: u32) -> Self {
        TableIdentifier::Id(value)
    }
}

impl From<String> for TableIdentifier {
    fn from(value: String) -> Self {
        TableIdentifier::Name(value)
    }
}

impl From<&str> for TableIdentifier {
    fn from(value: &str) -> Self {
        TableIdentifier::Name(value.to_string())
    }
}

/// Validate an Excel table name (ListObject name).
///
/// This mirrors Excel's rules approximately:
/// - Names are non-empty, <= 255 chars.
/// - First character must be an ASCII letter or `_`.
/// - Remaining characters may contain ASCII letters, digits, `_`, or `.`.
/// - Names may not look like A1 or R1C1 references (e.g. `A1`, `R1C1`).
/// - Names may not be reserved (`R`, `C`, `TRUE`, `FALSE`).
///
/// Uniqueness is enforced by [`crate::Worksheet::add_table`].
pub fn validate_table_name(name: &str) -> Result<(), TableError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TableError::EmptyName);
    }
    if name.chars().count() > 255 {
        return Err(TableError::NameTooLong);
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(TableError::EmptyName);
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(TableError::InvalidStartChar);
    }

    for ch in chars {
        if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.') {
            return Err(TableError::InvalidChar { ch });
        }
    }

    if Range::from_a1(name).is_ok() {
        return Err(TableError::ConflictsWithCellReference);
    }

    if name.eq_ignore_ascii_case("R")
        || name.eq_ignore_ascii_case("C")
        || name.eq_ignore_ascii_case("TRUE")
        || name.eq_ignore_ascii_case("FALSE")
    {
        return Err(TableError::ReservedName);
    }
    if looks_like_r1c1_reference(name) {
        return Err(TableError::ConflictsWithCellReference);
    }

    Ok(())
}

fn looks_like_r1c1_reference(name: &str) -> bool {
    // R1C1, R1 or C1 (case-insensitive).
    let bytes = name.as_bytes();
    let Some((&first, rest)) = bytes.split_first() else {
        return false;
    };

    match first.to_ascii_uppercase() {
        b'R' => {
            if rest.is_empty() {
                return false;
            }

            let mut i = 0usize;
            while i < rest.len() && rest[i].is_ascii_digit() {
                i += 1;
            }
            if i == rest.len() {
                return true;
            }

            if i == 0 || rest[i].to_ascii_uppercase() != b'C' {
                return false;
            }
            i += 1;
            if i >= rest.len() {
                return false;
            }
            let start = i;
            while i < rest.len() && rest[i].is_ascii_digit() {
                i += 1;
            }
            i > start && i == rest.len()
        }
        b'C' => !rest.is_empty() && rest.iter().all(|b| b.is_ascii_digit()),
        _ => false,
    }
}

/// A named rectangular region of a worksheet with a header row, optional
/// totals row and per-column metadata.
///
/// Structural edits go through [`crate::Worksheet::edit_table`]; a `Table`
/// on its own only answers geometry questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    /// `None` once every column has been deleted.
    pub range: Option<Range>,
    pub header_row_count: u32,
    pub totals_row_count: u32,
    pub columns: TableColumnSet,
}

impl Table {
    pub fn new(id: u32, name: impl Into<String>, range: Range, columns: TableColumnSet) -> Self {
        let name = name.into();
        Self {
            id,
            display_name: name.clone(),
            name,
            range: Some(range),
            header_row_count: 1,
            totals_row_count: 0,
            columns,
        }
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn is_deleted(&self) -> bool {
        self.range.is_none()
    }

    pub fn show_totals(&self) -> bool {
        self.totals_row_count > 0
    }

    pub fn matches(&self, identifier: &TableIdentifier) -> bool {
        match identifier {
            TableIdentifier::Id(id) => self.id == *id,
            TableIdentifier::Name(name) => text_eq_case_insensitive(&self.name, name),
        }
    }

    /// Smallest height the range may shrink to: header, totals and one data row.
    pub fn min_height(&self) -> u32 {
        self.header_row_count + self.totals_row_count + 1
    }

    pub fn data_row_count(&self) -> u32 {
        self.range.map_or(0, |r| {
            r.height()
                .saturating_sub(self.header_row_count + self.totals_row_count)
        })
    }

    pub fn data_range(&self) -> Option<Range> {
        let r = self.range?;
        let start_row = r.start.row.checked_add(self.header_row_count)?;
        let end_row = r.end.row.checked_sub(self.totals_row_count)?;
        if start_row > end_row {
            return None;
        }
        Some(Range::new(
            CellRef::new(start_row, r.start.col),
            CellRef::new(end_row, r.end.col),
        ))
    }

    pub fn header_range(&self) -> Option<Range> {
        if self.header_row_count == 0 {
            return None;
        }
        let r = self.range?;
        let header_end = self
            .header_row_count
            .checked_sub(1)
            .and_then(|delta| r.start.row.checked_add(delta))?;
        Some(Range::new(r.start, CellRef::new(header_end, r.end.col)))
    }

    pub fn totals_range(&self) -> Option<Range> {
        if self.totals_row_count == 0 {
            return None;
        }
        let r = self.range?;
        let start_row = r
            .end
            .row
            .saturating_sub(self.totals_row_count.saturating_sub(1));
        Some(Range::new(CellRef::new(start_row, r.start.col), r.end))
    }

    pub fn column_index(&self, name: &str) -> Option<u32> {
        self.columns.index_of(name).map(|idx| idx as u32)
    }

    pub fn column_range_in_area(&self, column_name: &str, area: TableArea) -> Option<Range> {
        let r = self.range?;
        let col_offset = self.column_index(column_name)?;
        let col = r.start.col + col_offset;

        let rows = match area {
            TableArea::Headers => self.header_range()?,
            TableArea::Totals => self.totals_range()?,
            TableArea::Data => self.data_range()?,
            TableArea::All => r,
        };
        Some(Range::new(
            CellRef::new(rows.start.row, col),
            CellRef::new(rows.end.row, col),
        ))
    }

    pub fn cell_for_this_row(&self, current_cell: CellRef, column_name: &str) -> Option<CellRef> {
        let r = self.range?;
        let data_range = self.data_range()?;
        if !data_range.contains(current_cell) {
            return None;
        }
        let col_offset = self.column_index(column_name)?;
        Some(CellRef::new(current_cell.row, r.start.col + col_offset))
    }

    /// Every formula the table stores (calculated and totals formulas).
    pub(crate) fn formulas_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.columns
            .iter_mut()
            .flat_map(|c| c.formula.iter_mut().chain(c.totals_formula.iter_mut()))
    }

    /// Totals row cell content for column `index`, if it has any.
    pub(crate) fn totals_cell_content(&self, index: usize) -> Option<TotalsCell> {
        let column = self.columns.get(index)?;
        if let Some(code) = column.totals_row_function.subtotal_code() {
            return Some(TotalsCell::Formula(format!(
                "SUBTOTAL({code},{}[{}])",
                self.name,
                escape_column_name(&column.name)
            )));
        }
        match column.totals_row_function {
            TotalsRowFunction::Custom => column.totals_formula.clone().map(TotalsCell::Formula),
            _ => column.totals_row_label.clone().map(TotalsCell::Label),
        }
    }
}

pub(crate) enum TotalsCell {
    Formula(String),
    Label(String),
}

/// Escape the structured-reference special characters of a column name.
fn escape_column_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, '[' | ']' | '#' | '\'') {
            out.push('\'');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableArea {
    Headers,
    Data,
    Totals,
    All,
}

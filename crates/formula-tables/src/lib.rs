//! `formula-tables` is an in-memory worksheet model with Excel-style tables and
//! structural edits.
//!
//! A [`Worksheet`] owns sparse cell storage, merged regions and tables. Rows
//! and columns can be inserted or deleted either sheet-wide or through a
//! table's [`TableEditor`]; every edit keeps the table ranges, table column
//! metadata, merged regions and A1 formula references on the sheet
//! consistent, and either fully applies or leaves the sheet untouched.
//!
//! ```
//! use formula_tables::Worksheet;
//!
//! let mut sheet = Worksheet::new(1, "Sheet1");
//! sheet.set_value_a1("A1", "Item").unwrap();
//! sheet.set_value_a1("B1", "Qty").unwrap();
//! let id = sheet.add_table_a1("Orders", "A1:B10").unwrap();
//!
//! sheet.edit_table(id).unwrap().delete_rows(0, 3).unwrap();
//! assert_eq!(sheet.table(id).unwrap().range.unwrap().to_string(), "A1:B7");
//! ```

mod address;
mod cell;
mod formula_rewrite;
mod formula_text;
mod grid;
mod limits;
mod merge;
mod structural;
pub mod table;
mod value;
mod worksheet;

pub use address::{A1ParseError, CellRef, Range, RangeCollapsed, RangeIter, RangeParseError};
pub use cell::{Cell, CellKey, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use formula_rewrite::{rewrite_formula_for_structural_edit, EditAxis, FormulaRewrite, StructuralEdit};
pub use formula_text::{display_formula_text, normalize_formula_text};
pub use grid::{GridError, SparseGrid};
pub use limits::{LimitsError, SheetLimits};
pub use merge::{MergeError, MergedRegion, MergedRegions};
pub use structural::ReferenceFixup;
pub use table::{
    validate_table_name, Table, TableArea, TableColumn, TableColumnSet, TableEditor, TableError,
    TableErrorKind, TableIdentifier, TotalsRowFunction, UnknownTotalsRowFunction,
};
pub use value::{CellValue, ErrorValue};
pub use worksheet::{SheetError, Worksheet, WorksheetId};

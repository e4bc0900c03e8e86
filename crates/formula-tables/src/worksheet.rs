use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::structural::{apply_structural_edit, ReferenceFixup};
use crate::table::{validate_table_name, TableColumnSet, TableIdentifier};
use crate::value::text_eq_case_insensitive;
use crate::{
    A1ParseError, CellRef, CellValue, GridError, MergeError, MergedRegions, Range,
    RangeParseError, SheetLimits, SparseGrid, StructuralEdit, Table, TableEditor, TableError,
};

/// Identifier for a worksheet.
pub type WorksheetId = u32;

/// Errors from the A1-addressed worksheet helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error(transparent)]
    Cell(#[from] A1ParseError),
    #[error(transparent)]
    Range(#[from] RangeParseError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// A worksheet: sparse cells, merged regions and tables under one set of limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Worksheet {
    /// Stable worksheet identifier.
    pub id: WorksheetId,
    /// Display name, used to recognise sheet-qualified references in formulas.
    pub name: String,

    #[serde(default)]
    pub(crate) cells: SparseGrid,

    #[serde(default, skip_serializing_if = "MergedRegions::is_empty")]
    pub(crate) merged_regions: MergedRegions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) tables: Vec<Table>,

    /// Next table id to allocate (runtime-only).
    #[serde(skip)]
    next_table_id: u32,
}

impl Worksheet {
    /// Create an empty worksheet with Excel's grid limits.
    pub fn new(id: WorksheetId, name: impl Into<String>) -> Self {
        Self::with_limits(id, name, SheetLimits::default())
    }

    pub fn with_limits(id: WorksheetId, name: impl Into<String>, limits: SheetLimits) -> Self {
        Self {
            id,
            name: name.into(),
            cells: SparseGrid::new(limits),
            merged_regions: MergedRegions::new(),
            tables: Vec::new(),
            next_table_id: 1,
        }
    }

    pub fn limits(&self) -> &SheetLimits {
        self.cells.limits()
    }

    pub fn cells(&self) -> &SparseGrid {
        &self.cells
    }

    pub fn merged_regions(&self) -> &MergedRegions {
        &self.merged_regions
    }

    // -- cells --------------------------------------------------------------

    /// Value at `cell`. Cells covered by a merge read as empty.
    pub fn value(&self, cell: CellRef) -> CellValue {
        self.cells.value(cell)
    }

    pub fn formula(&self, cell: CellRef) -> Option<&str> {
        self.cells.formula(cell)
    }

    /// Write a literal value. Writes inside a merged region land on its anchor.
    pub fn set_value(&mut self, cell: CellRef, value: impl Into<CellValue>) -> Result<(), GridError> {
        let cell = self.resolve_merge(cell);
        self.cells.set_value(cell, value.into())
    }

    /// Set or clear a formula. Writes inside a merged region land on its anchor.
    pub fn set_formula(&mut self, cell: CellRef, formula: Option<&str>) -> Result<(), GridError> {
        let cell = self.resolve_merge(cell);
        self.cells.set_formula(cell, formula.map(str::to_string))
    }

    pub fn clear_cell(&mut self, cell: CellRef) {
        self.cells.clear(cell);
    }

    /// Number of stored (non-empty) cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn used_range(&self) -> Option<Range> {
        self.cells.used_range()
    }

    pub fn value_a1(&self, a1: &str) -> Result<CellValue, SheetError> {
        Ok(self.value(CellRef::from_a1(a1)?))
    }

    pub fn formula_a1(&self, a1: &str) -> Result<Option<&str>, SheetError> {
        Ok(self.formula(CellRef::from_a1(a1)?))
    }

    pub fn set_value_a1(&mut self, a1: &str, value: impl Into<CellValue>) -> Result<(), SheetError> {
        let cell = CellRef::from_a1(a1)?;
        Ok(self.set_value(cell, value)?)
    }

    pub fn set_formula_a1(&mut self, a1: &str, formula: &str) -> Result<(), SheetError> {
        let cell = CellRef::from_a1(a1)?;
        Ok(self.set_formula(cell, Some(formula))?)
    }

    fn resolve_merge(&self, cell: CellRef) -> CellRef {
        self.merged_regions
            .containing(cell)
            .map_or(cell, |region| region.anchor())
    }

    // -- merges -------------------------------------------------------------

    /// Merge `range`. Content outside the top-left anchor is discarded.
    pub fn merge_range(&mut self, range: Range) -> Result<(), SheetError> {
        if !self.cells.limits().contains(range.end) {
            return Err(GridError::OutOfBounds { cell: range.end }.into());
        }
        self.merged_regions.add(range)?;
        let anchor = range.start;
        let doomed: Vec<CellRef> = self
            .cells
            .iter_range(range)
            .map(|(cell, _)| cell)
            .filter(|cell| *cell != anchor)
            .collect();
        for cell in doomed {
            self.cells.clear(cell);
        }
        Ok(())
    }

    pub fn merge_range_a1(&mut self, a1: &str) -> Result<(), SheetError> {
        self.merge_range(Range::from_a1(a1)?)
    }

    /// Remove every merged region intersecting `range`. Returns how many were removed.
    pub fn unmerge_range(&mut self, range: Range) -> usize {
        self.merged_regions.remove_intersecting(range)
    }

    // -- tables -------------------------------------------------------------

    /// Bind `range` as a new table named `name`.
    ///
    /// Column names come from the first row of `range`; blank header cells get
    /// generated names. Returns the new table's id.
    pub fn add_table(&mut self, name: &str, range: Range) -> Result<u32, TableError> {
        validate_table_name(name)?;
        let name = name.trim();
        if self
            .tables
            .iter()
            .any(|t| text_eq_case_insensitive(&t.name, name))
        {
            return Err(TableError::DuplicateName);
        }
        if range.height() < 2 {
            return Err(TableError::InvalidRange);
        }
        if !self.cells.limits().contains(range.end) {
            return Err(TableError::ExceedsSheetLimit);
        }
        if let Some(other) = self
            .tables
            .iter()
            .find(|t| t.range.is_some_and(|r| r.intersects(&range)))
        {
            return Err(TableError::OverlapsTable {
                name: other.name.clone(),
            });
        }

        let header_row = range.start.row;
        let columns = TableColumnSet::from_header_names((range.start.col..=range.end.col).map(
            |col| {
                let value = self.cells.value(CellRef::new(header_row, col));
                (!value.is_empty()).then(|| value.to_string())
            },
        ));

        let id = self
            .tables
            .iter()
            .map(|t| t.id + 1)
            .max()
            .unwrap_or(1)
            .max(self.next_table_id);
        self.next_table_id = id + 1;
        let table = Table::new(id, name, range, columns);
        for (idx, column) in table.columns.iter().enumerate() {
            let cell = CellRef::new(header_row, range.start.col + idx as u32);
            if self.cells.value(cell).as_str() != Some(column.name.as_str()) {
                self.cells
                    .put(cell, crate::Cell::new(CellValue::String(column.name.clone())));
            }
        }
        log::debug!("sheet '{}': added table '{name}' at {range}", self.name);
        self.tables.push(table);
        Ok(id)
    }

    pub fn add_table_a1(&mut self, name: &str, a1: &str) -> Result<u32, SheetError> {
        let range = Range::from_a1(a1)?;
        Ok(self.add_table(name, range)?)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, identifier: impl Into<TableIdentifier>) -> Option<&Table> {
        let identifier = identifier.into();
        self.tables.iter().find(|t| t.matches(&identifier))
    }

    /// Detach a table from the sheet. Its cells stay in place.
    pub fn remove_table(&mut self, identifier: impl Into<TableIdentifier>) -> Option<Table> {
        let identifier = identifier.into();
        let idx = self.tables.iter().position(|t| t.matches(&identifier))?;
        Some(self.tables.remove(idx))
    }

    /// Drop every table whose columns have all been deleted.
    pub fn prune_deleted_tables(&mut self) -> usize {
        let before = self.tables.len();
        self.tables.retain(|t| !t.is_deleted());
        before - self.tables.len()
    }

    /// Structural editor for one table.
    pub fn edit_table(
        &mut self,
        identifier: impl Into<TableIdentifier>,
    ) -> Result<TableEditor<'_>, TableError> {
        let identifier = identifier.into();
        let index = self
            .tables
            .iter()
            .position(|t| t.matches(&identifier))
            .ok_or(TableError::TableNotFound)?;
        Ok(TableEditor::new(self, index))
    }

    // -- worksheet-wide structural edits ------------------------------------

    /// Insert `count` blank rows before row `row` (0-indexed).
    pub fn insert_rows(&mut self, row: u32, count: u32) -> Result<(), TableError> {
        self.insert_rows_with_fixup(row, count, None)
    }

    pub fn insert_rows_with_fixup(
        &mut self,
        row: u32,
        count: u32,
        fixup: Option<&mut dyn ReferenceFixup>,
    ) -> Result<(), TableError> {
        self.check_band(row, count, self.cells.limits().max_rows)?;
        apply_structural_edit(self, StructuralEdit::InsertRows { row, count }, None, fixup)
    }

    /// Delete rows `row..row + count` (0-indexed).
    pub fn delete_rows(&mut self, row: u32, count: u32) -> Result<(), TableError> {
        self.delete_rows_with_fixup(row, count, None)
    }

    pub fn delete_rows_with_fixup(
        &mut self,
        row: u32,
        count: u32,
        fixup: Option<&mut dyn ReferenceFixup>,
    ) -> Result<(), TableError> {
        self.check_band(row, count, self.cells.limits().max_rows)?;
        apply_structural_edit(self, StructuralEdit::DeleteRows { row, count }, None, fixup)
    }

    /// Insert `count` blank columns before column `col` (0-indexed).
    pub fn insert_cols(&mut self, col: u32, count: u32) -> Result<(), TableError> {
        self.insert_cols_with_fixup(col, count, None)
    }

    pub fn insert_cols_with_fixup(
        &mut self,
        col: u32,
        count: u32,
        fixup: Option<&mut dyn ReferenceFixup>,
    ) -> Result<(), TableError> {
        self.check_band(col, count, self.cells.limits().max_cols)?;
        apply_structural_edit(self, StructuralEdit::InsertCols { col, count }, None, fixup)
    }

    /// Delete columns `col..col + count` (0-indexed).
    pub fn delete_cols(&mut self, col: u32, count: u32) -> Result<(), TableError> {
        self.delete_cols_with_fixup(col, count, None)
    }

    pub fn delete_cols_with_fixup(
        &mut self,
        col: u32,
        count: u32,
        fixup: Option<&mut dyn ReferenceFixup>,
    ) -> Result<(), TableError> {
        self.check_band(col, count, self.cells.limits().max_cols)?;
        apply_structural_edit(self, StructuralEdit::DeleteCols { col, count }, None, fixup)
    }

    /// The band `[at, at + count)` must fit inside `0..max`.
    fn check_band(&self, at: u32, count: u32, max: u32) -> Result<(), TableError> {
        if u64::from(at) + u64::from(count) > u64::from(max) {
            return Err(TableError::ExceedsSheetLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    #[test]
    fn writes_inside_a_merge_go_to_the_anchor() {
        let mut sheet = Worksheet::new(1, "Sheet1");
        sheet.set_value_a1("B2", 5.0).unwrap();
        sheet.merge_range_a1("A1:B2").unwrap();
        assert_eq!(sheet.value_a1("B2").unwrap(), CellValue::Empty);

        sheet.set_value_a1("B1", "x").unwrap();
        assert_eq!(sheet.value(cell("A1")), CellValue::from("x"));
        assert_eq!(sheet.cell_count(), 1);
    }

    #[test]
    fn add_table_reads_and_fills_header_names() {
        let mut sheet = Worksheet::new(1, "Sheet1");
        sheet.set_value_a1("A1", "Qty").unwrap();
        sheet.set_value_a1("C1", "qty").unwrap();
        let id = sheet.add_table_a1("Orders", "A1:C4").unwrap();

        let table = sheet.table(id).unwrap();
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Qty", "Column1", "qty2"]);
        assert_eq!(sheet.value_a1("B1").unwrap(), CellValue::from("Column1"));
        assert_eq!(sheet.value_a1("C1").unwrap(), CellValue::from("qty2"));
        assert!(sheet.table("orders").is_some());
    }

    #[test]
    fn add_table_validates_name_shape_and_overlap() {
        let mut sheet = Worksheet::new(1, "Sheet1");
        assert_eq!(
            sheet.add_table_a1("T1", "A1:B3"),
            Err(SheetError::Table(TableError::ConflictsWithCellReference))
        );
        sheet.add_table_a1("Sales", "A1:B3").unwrap();
        assert_eq!(
            sheet.add_table_a1("SALES", "D1:E3"),
            Err(SheetError::Table(TableError::DuplicateName))
        );
        assert_eq!(
            sheet.add_table_a1("Costs", "D1:E1"),
            Err(SheetError::Table(TableError::InvalidRange))
        );
        assert_eq!(
            sheet.add_table_a1("Costs", "B2:C4"),
            Err(SheetError::Table(TableError::OverlapsTable {
                name: "Sales".into()
            }))
        );
        assert_eq!(sheet.tables().len(), 1);
    }

    #[test]
    fn sheet_level_band_checks() {
        let mut sheet = Worksheet::with_limits(1, "S", SheetLimits::new(10, 5).unwrap());
        assert_eq!(sheet.insert_rows(8, 3), Err(TableError::ExceedsSheetLimit));
        assert_eq!(sheet.delete_cols(4, 2), Err(TableError::ExceedsSheetLimit));
        assert_eq!(sheet.insert_rows(8, 2), Ok(()));
    }
}

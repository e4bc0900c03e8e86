use crate::formula_text::normalize_formula_text;
use crate::structural::{apply_structural_edit, ReferenceFixup, TableUpdate};
use crate::{Cell, CellRef, CellValue, EditAxis, Range, StructuralEdit, Worksheet};

use super::{Table, TableColumnSet, TableError, TotalsCell, TotalsRowFunction};

/// Label written into the first totals cell when a totals row is switched on.
const TOTALS_LABEL: &str = "Total";

/// Structural editor for one table on a worksheet.
///
/// Offsets are relative to the table: row offsets count data rows (the header
/// is excluded), column offsets count table columns from the left edge.
/// Signed arguments are accepted so negative input can be reported as an
/// argument error rather than wrapping.
///
/// Every operation is all-or-nothing: on error the worksheet, its tables and
/// its merged regions are exactly as they were before the call.
pub struct TableEditor<'a> {
    sheet: &'a mut Worksheet,
    index: usize,
    fixup: Option<&'a mut dyn ReferenceFixup>,
}

impl<'a> TableEditor<'a> {
    pub(crate) fn new(sheet: &'a mut Worksheet, index: usize) -> Self {
        Self {
            sheet,
            index,
            fixup: None,
        }
    }

    /// Call `fixup` after every committed shift.
    pub fn with_fixup(mut self, fixup: &'a mut dyn ReferenceFixup) -> Self {
        self.fixup = Some(fixup);
        self
    }

    pub fn table(&self) -> &Table {
        &self.sheet.tables[self.index]
    }

    pub fn delete_row(&mut self, start_offset: i64) -> Result<(), TableError> {
        self.delete_rows(start_offset, 1)
    }

    /// Delete `row_count` rows starting at data row `start_offset`.
    ///
    /// The data rows and the totals row are addressable. A band reaching into
    /// the totals row removes the data rows directly above it instead, so the
    /// totals row survives as the last row. At least one data row must remain.
    pub fn delete_rows(&mut self, start_offset: i64, row_count: i64) -> Result<(), TableError> {
        let (start, count) = check_args(start_offset, row_count)?;
        if count == 0 {
            return Ok(());
        }
        let (table, range) = self.current()?;
        let addressable = range.height() - table.header_row_count;
        if u64::from(start) + u64::from(count) > u64::from(addressable) {
            return Err(TableError::ExceedsTableBounds {
                axis: EditAxis::Rows,
                offset: start,
                count,
                available: addressable,
            });
        }
        let data_rows = table.data_row_count();
        if count >= data_rows {
            return Err(TableError::RangeCollapsed);
        }
        let start = if start + count > data_rows {
            log::debug!(
                "table '{}': row delete at {start} reaches the totals row, removing the {count} rows above it",
                table.name
            );
            data_rows - count
        } else {
            start
        };

        let new_range = range.shrink_rows(count, table.min_height())?;
        let update = TableUpdate::new(self.index, Some(new_range), table.columns.clone());
        let row = range.start.row + table.header_row_count + start;
        self.commit(StructuralEdit::DeleteRows { row, count }, update)
    }

    pub fn insert_row(&mut self, start_offset: i64) -> Result<(), TableError> {
        self.insert_rows(start_offset, 1)
    }

    /// Insert `row_count` blank data rows before data row `start_offset`.
    ///
    /// `start_offset == data rows` appends below the last data row (above the
    /// totals row, if any).
    pub fn insert_rows(&mut self, start_offset: i64, row_count: i64) -> Result<(), TableError> {
        let (start, count) = check_args(start_offset, row_count)?;
        if count == 0 {
            return Ok(());
        }
        let (table, range) = self.current()?;
        let data_rows = table.data_row_count();
        if start > data_rows {
            return Err(TableError::ExceedsTableBounds {
                axis: EditAxis::Rows,
                offset: start,
                count,
                available: data_rows,
            });
        }
        let last_row = self.sheet.cells.limits().last_row();
        let new_range = range
            .grow_rows(count)
            .filter(|r| r.end.row <= last_row)
            .ok_or(TableError::ExceedsSheetLimit)?;

        let update = TableUpdate::new(self.index, Some(new_range), table.columns.clone());
        let row = range.start.row + table.header_row_count + start;
        self.commit(StructuralEdit::InsertRows { row, count }, update)
    }

    pub fn delete_column(&mut self, start_offset: i64) -> Result<(), TableError> {
        self.delete_columns(start_offset, 1)
    }

    /// Delete `col_count` worksheet columns starting at table column `start_offset`.
    ///
    /// Deleting every column removes the table: its range becomes `None` and
    /// its column set is emptied.
    pub fn delete_columns(&mut self, start_offset: i64, col_count: i64) -> Result<(), TableError> {
        let (start, count) = check_args(start_offset, col_count)?;
        if count == 0 {
            return Ok(());
        }
        let (table, range) = self.current()?;
        let width = range.width();
        if u64::from(start) + u64::from(count) > u64::from(width) {
            return Err(TableError::ExceedsTableBounds {
                axis: EditAxis::Cols,
                offset: start,
                count,
                available: width,
            });
        }

        let update = if count == width {
            log::debug!("table '{}': deleting every column removes the table", table.name);
            TableUpdate::new(self.index, None, TableColumnSet::new())
        } else {
            let mut columns = table.columns.clone();
            columns.remove_at(start as usize, count as usize)?;
            let new_range = range.shrink_cols(count, 1)?;
            TableUpdate::new(self.index, Some(new_range), columns)
        };
        let col = range.start.col + start;
        self.commit(StructuralEdit::DeleteCols { col, count }, update)
    }

    pub fn insert_column(&mut self, start_offset: i64) -> Result<(), TableError> {
        self.insert_columns(start_offset, 1)
    }

    /// Insert `col_count` worksheet columns before table column `start_offset`.
    ///
    /// New table columns get generated `Column{n}` names, which are written
    /// into the header row.
    pub fn insert_columns(&mut self, start_offset: i64, col_count: i64) -> Result<(), TableError> {
        let (start, count) = check_args(start_offset, col_count)?;
        if count == 0 {
            return Ok(());
        }
        let (table, range) = self.current()?;
        let width = range.width();
        if start > width {
            return Err(TableError::ExceedsTableBounds {
                axis: EditAxis::Cols,
                offset: start,
                count,
                available: width,
            });
        }
        let last_col = self.sheet.cells.limits().last_col();
        let new_range = range
            .grow_cols(count)
            .filter(|r| r.end.col <= last_col)
            .ok_or(TableError::ExceedsSheetLimit)?;

        let mut columns = table.columns.clone();
        let inserted = columns.insert_at(start as usize, count as usize)?;
        let mut update = TableUpdate::new(self.index, Some(new_range), columns);
        update.inserted_columns = inserted;
        let col = range.start.col + start;
        self.commit(StructuralEdit::InsertCols { col, count }, update)
    }

    /// Show or hide the totals row.
    ///
    /// Showing it claims the row directly below the table, which must be
    /// inside the sheet, empty, and free of other tables and merges.
    pub fn set_show_totals(&mut self, show: bool) -> Result<(), TableError> {
        let (table, range) = self.current()?;
        if table.show_totals() == show {
            return Ok(());
        }

        if !show {
            let totals = table.totals_range();
            let new_range = Range::from_bounds(
                range.start.row,
                range.start.col,
                range.end.row - table.totals_row_count,
                range.end.col,
            );
            if let Some(totals) = totals {
                self.sheet.cells.clear_region(totals);
            }
            let table = &mut self.sheet.tables[self.index];
            table.range = Some(new_range);
            table.totals_row_count = 0;
            log::debug!("table '{}': totals row hidden", table.name);
            return Ok(());
        }

        let row = range
            .end
            .row
            .checked_add(1)
            .filter(|row| *row <= self.sheet.cells.limits().last_row())
            .ok_or(TableError::ExceedsSheetLimit)?;
        let band = Range::from_bounds(row, range.start.col, row, range.end.col);
        if let Some(other) = self
            .sheet
            .tables
            .iter()
            .filter_map(|t| t.range.map(|r| (t, r)))
            .find(|(_, r)| r.intersects(&band))
        {
            return Err(TableError::OverlapsTable {
                name: other.0.name.clone(),
            });
        }
        if !self.sheet.cells.is_region_empty(band)
            || self.sheet.merged_regions.iter().any(|m| m.range.intersects(&band))
        {
            return Err(TableError::TotalsRowOccupied);
        }

        let table = &mut self.sheet.tables[self.index];
        table.range = Some(Range::from_bounds(
            range.start.row,
            range.start.col,
            row,
            range.end.col,
        ));
        table.totals_row_count = 1;
        if let Some(first) = table.columns.get_mut(0) {
            if first.totals_row_function == TotalsRowFunction::None
                && first.totals_row_label.is_none()
            {
                first.totals_row_label = Some(TOTALS_LABEL.to_string());
            }
        }
        log::debug!("table '{}': totals row shown", table.name);
        self.refresh_totals_row();
        Ok(())
    }

    /// Change the totals function of column `column` and rewrite its totals cell.
    pub fn set_totals_row_function(
        &mut self,
        column: usize,
        function: TotalsRowFunction,
    ) -> Result<(), TableError> {
        self.current()?;
        let table = &mut self.sheet.tables[self.index];
        let len = table.columns.len();
        let entry = table
            .columns
            .get_mut(column)
            .ok_or(TableError::ColumnIndexOutOfRange {
                index: column,
                count: 1,
                len,
            })?;
        entry.totals_row_function = function;
        self.write_totals_cell(column, true);
        Ok(())
    }

    /// Set or clear the calculated formula of column `column`.
    ///
    /// Setting a formula writes it into every data row of the column.
    /// Clearing it keeps the existing cells.
    pub fn set_calculated_formula(
        &mut self,
        column: usize,
        formula: Option<&str>,
    ) -> Result<(), TableError> {
        self.current()?;
        let table = &mut self.sheet.tables[self.index];
        let len = table.columns.len();
        let entry = table
            .columns
            .get_mut(column)
            .ok_or(TableError::ColumnIndexOutOfRange {
                index: column,
                count: 1,
                len,
            })?;
        entry.formula = formula
            .map(normalize_formula_text)
            .filter(|f| !f.is_empty());
        if entry.formula.is_none() {
            return Ok(());
        }

        let table = &self.sheet.tables[self.index];
        let formula = table.columns.get(column).and_then(|c| c.formula.clone());
        if let (Some(data), Some(formula)) = (table.data_range(), formula) {
            let col = data.start.col + column as u32;
            for row in data.start.row..=data.end.row {
                self.sheet
                    .cells
                    .put(CellRef::new(row, col), Cell::with_formula(formula.clone()));
            }
        }
        Ok(())
    }

    fn current(&self) -> Result<(&Table, Range), TableError> {
        let table = self
            .sheet
            .tables
            .get(self.index)
            .ok_or(TableError::TableNotFound)?;
        let range = table.range.ok_or(TableError::TableDeleted)?;
        Ok((table, range))
    }

    fn commit(&mut self, edit: StructuralEdit, update: TableUpdate) -> Result<(), TableError> {
        let fixup: Option<&mut dyn ReferenceFixup> = match &mut self.fixup {
            Some(fixup) => Some(&mut **fixup),
            None => None,
        };
        apply_structural_edit(self.sheet, edit, Some(update), fixup)?;
        self.refresh_totals_row();
        Ok(())
    }

    fn refresh_totals_row(&mut self) {
        let len = self.table().columns.len();
        for idx in 0..len {
            self.write_totals_cell(idx, false);
        }
    }

    /// Write the totals cell of column `idx`. With `clear_empty`, a column
    /// without totals content has its cell cleared.
    fn write_totals_cell(&mut self, idx: usize, clear_empty: bool) {
        let table = &self.sheet.tables[self.index];
        let Some(totals) = table.totals_range() else {
            return;
        };
        let cell = CellRef::new(totals.start.row, totals.start.col + idx as u32);
        let style_id = self.sheet.cells.get(cell).map_or(0, |c| c.style_id);
        let record = match table.totals_cell_content(idx) {
            Some(TotalsCell::Formula(formula)) => Cell {
                value: CellValue::Empty,
                formula: Some(formula),
                style_id,
            },
            Some(TotalsCell::Label(label)) => Cell {
                value: CellValue::String(label),
                formula: None,
                style_id,
            },
            None if clear_empty => Cell {
                style_id,
                ..Cell::default()
            },
            None => return,
        };
        self.sheet.cells.put(cell, record);
    }
}

/// Reject negative input, then narrow to `u32`.
///
/// Offsets beyond `u32` saturate; they fail the bounds check that follows.
fn check_args(start_offset: i64, count: i64) -> Result<(u32, u32), TableError> {
    if start_offset < 0 {
        return Err(TableError::NegativeOffset(start_offset));
    }
    if count < 0 {
        return Err(TableError::NegativeCount(count));
    }
    let start = u32::try_from(start_offset).unwrap_or(u32::MAX);
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    Ok((start, count))
}

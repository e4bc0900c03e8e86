//! Worksheet-wide row/column shifts shared by worksheet and table edits.
//!
//! Every edit runs in two phases. Planning computes the new shape of every
//! table and merged region without touching the sheet and fails on the first
//! violated constraint. Committing then shifts the grid (the only fallible
//! step, and one that checks its bounds before moving anything) and applies
//! the planned state.

use std::ops::Range as IndexRange;

use crate::formula_text::normalize_formula_text;
use crate::table::{Table, TableColumnSet};
use crate::{
    rewrite_formula_for_structural_edit, Cell, CellRef, CellValue, EditAxis, Range, SheetLimits,
    StructuralEdit, TableError, Worksheet,
};

/// Hook invoked once per committed shift so formulas held outside the
/// worksheet (other sheets, defined names, caches) can be relocated.
pub trait ReferenceFixup {
    fn structural_edit(&mut self, sheet: &str, edit: &StructuralEdit);
}

impl<F> ReferenceFixup for F
where
    F: FnMut(&str, &StructuralEdit),
{
    fn structural_edit(&mut self, sheet: &str, edit: &StructuralEdit) {
        self(sheet, edit)
    }
}

/// Planned replacement state for one table.
#[derive(Debug, Clone)]
pub(crate) struct TableUpdate {
    pub(crate) index: usize,
    pub(crate) range: Option<Range>,
    pub(crate) columns: TableColumnSet,
    /// Column positions created by the edit; their header cells get written.
    pub(crate) inserted_columns: IndexRange<usize>,
}

impl TableUpdate {
    pub(crate) fn new(index: usize, range: Option<Range>, columns: TableColumnSet) -> Self {
        Self {
            index,
            range,
            columns,
            inserted_columns: 0..0,
        }
    }
}

/// Apply `edit` to the whole worksheet.
///
/// `owner` carries the already-validated new state of the table the edit was
/// issued through; every other table follows the shift on its own terms.
pub(crate) fn apply_structural_edit(
    sheet: &mut Worksheet,
    edit: StructuralEdit,
    owner: Option<TableUpdate>,
    fixup: Option<&mut dyn ReferenceFixup>,
) -> Result<(), TableError> {
    if edit.count() == 0 {
        return Ok(());
    }
    let limits = *sheet.cells.limits();
    let owner_index = owner.as_ref().map(|u| u.index);

    let mut updates = Vec::new();
    for (index, table) in sheet.tables.iter().enumerate() {
        if Some(index) == owner_index {
            continue;
        }
        if let Some(update) = follow_edit(index, table, &edit, &limits)? {
            updates.push(update);
        }
    }
    updates.extend(owner);

    let last_index = match edit.axis() {
        EditAxis::Rows => limits.last_row(),
        EditAxis::Cols => limits.last_col(),
    };
    let merges = sheet
        .merged_regions
        .plan_structural_edit(&edit, last_index)
        .ok_or(TableError::ExceedsSheetLimit)?;

    shift_grid(sheet, &edit)?;

    let mut invalidated = 0usize;
    for (_, formula) in sheet.cells.formulas_mut() {
        invalidated += rewrite_in_place(formula, &sheet.name, &edit, &limits);
    }

    for update in updates {
        let Some(table) = sheet.tables.get_mut(update.index) else {
            continue;
        };
        table.range = update.range;
        table.columns = update.columns;
        if let (Some(range), true) = (table.range, table.header_row_count > 0) {
            for idx in update.inserted_columns {
                if let Some(column) = table.columns.get(idx) {
                    let cell = CellRef::new(range.start.row, range.start.col + idx as u32);
                    sheet
                        .cells
                        .put(cell, Cell::new(CellValue::String(column.name.clone())));
                }
            }
        }
    }

    for table in sheet.tables.iter_mut() {
        for formula in table.formulas_mut() {
            invalidated += rewrite_in_place(formula, &sheet.name, &edit, &limits);
        }
    }

    if let StructuralEdit::InsertRows { row, count } = edit {
        for table in &sheet.tables {
            fill_calculated_columns(&mut sheet.cells, table, row, row.saturating_add(count - 1));
        }
    }

    sheet.merged_regions.replace(merges);

    if invalidated > 0 {
        log::warn!(
            "{edit} on sheet '{}' invalidated {invalidated} formula reference(s)",
            sheet.name
        );
    }
    if let Some(fixup) = fixup {
        fixup.structural_edit(&sheet.name, &edit);
    }
    log::debug!("applied {edit} on sheet '{}'", sheet.name);
    Ok(())
}

fn shift_grid(sheet: &mut Worksheet, edit: &StructuralEdit) -> Result<(), TableError> {
    let count = i64::from(edit.count());
    let result = match *edit {
        StructuralEdit::InsertRows { row, .. } => sheet.cells.shift_rows(row, count),
        StructuralEdit::DeleteRows { row, count: n } => {
            sheet.cells.shift_rows(row.saturating_add(n), -count)
        }
        StructuralEdit::InsertCols { col, .. } => sheet.cells.shift_columns(col, count),
        StructuralEdit::DeleteCols { col, count: n } => {
            sheet.cells.shift_columns(col.saturating_add(n), -count)
        }
    };
    result.map(|_| ()).map_err(|err| {
        log::debug!("rejected {edit}: {err}");
        TableError::ExceedsSheetLimit
    })
}

fn rewrite_in_place(
    formula: &mut String,
    sheet_name: &str,
    edit: &StructuralEdit,
    limits: &SheetLimits,
) -> usize {
    let rewrite = rewrite_formula_for_structural_edit(formula, sheet_name, edit, limits);
    if !rewrite.changed {
        return 0;
    }
    *formula = rewrite.formula;
    usize::from(rewrite.invalidated)
}

/// Write each calculated column's formula into data rows `first..=last`.
fn fill_calculated_columns(
    cells: &mut crate::SparseGrid,
    table: &Table,
    first: u32,
    last: u32,
) {
    let Some(data) = table.data_range() else {
        return;
    };
    let first = first.max(data.start.row);
    let last = last.min(data.end.row);
    if first > last {
        return;
    }
    for (idx, column) in table.columns.iter().enumerate() {
        let Some(formula) = column.formula.as_deref() else {
            continue;
        };
        let formula = normalize_formula_text(formula);
        let col = data.start.col + idx as u32;
        for row in first..=last {
            cells.put(CellRef::new(row, col), Cell::with_formula(formula.clone()));
        }
    }
}

/// New state of a table that does not own the edit, or `None` if untouched.
fn follow_edit(
    index: usize,
    table: &Table,
    edit: &StructuralEdit,
    limits: &SheetLimits,
) -> Result<Option<TableUpdate>, TableError> {
    let Some(range) = table.range else {
        return Ok(None);
    };
    let protected = || TableError::ShiftsProtectedTable {
        name: table.name.clone(),
    };
    let at = edit.position();
    let count = edit.count();
    let delta = edit.delta();
    let del_end = at.saturating_add(count - 1);
    let mut columns = table.columns.clone();
    let mut inserted_columns = 0..0;

    let new_range = match *edit {
        StructuralEdit::InsertRows { .. } => {
            if at > range.end.row {
                return Ok(None);
            }
            let moved = if at <= range.start.row {
                range.translate(delta, 0)
            } else {
                range.grow_rows(count)
            };
            moved
                .filter(|r| r.end.row <= limits.last_row())
                .ok_or(TableError::ExceedsSheetLimit)?
        }
        StructuralEdit::DeleteRows { .. } => {
            if at > range.end.row {
                return Ok(None);
            }
            if del_end < range.start.row {
                range.translate(delta, 0).ok_or_else(protected)?
            } else {
                if let Some(header) = table.header_range() {
                    if at <= header.end.row && del_end >= header.start.row {
                        return Err(protected());
                    }
                }
                if let Some(totals) = table.totals_range() {
                    if at <= totals.end.row && del_end >= totals.start.row {
                        return Err(protected());
                    }
                }
                let (start, end) = edit
                    .adjust_span(range.start.row, range.end.row)
                    .ok_or_else(protected)?;
                let shrunk = Range::from_bounds(start, range.start.col, end, range.end.col);
                if shrunk.height() < table.min_height() {
                    return Err(protected());
                }
                shrunk
            }
        }
        StructuralEdit::InsertCols { .. } => {
            if at > range.end.col {
                return Ok(None);
            }
            let moved = if at <= range.start.col {
                range.translate(0, delta)
            } else {
                let offset = (at - range.start.col) as usize;
                inserted_columns = columns.insert_at(offset, count as usize)?;
                range.grow_cols(count)
            };
            moved
                .filter(|r| r.end.col <= limits.last_col())
                .ok_or(TableError::ExceedsSheetLimit)?
        }
        StructuralEdit::DeleteCols { .. } => {
            if at > range.end.col {
                return Ok(None);
            }
            if del_end < range.start.col {
                range.translate(0, delta).ok_or_else(protected)?
            } else {
                if at <= range.start.col && del_end >= range.end.col {
                    return Err(protected());
                }
                let (start, end) = edit
                    .adjust_span(range.start.col, range.end.col)
                    .ok_or_else(protected)?;
                let first = at.max(range.start.col);
                let last = del_end.min(range.end.col);
                columns.remove_at((first - range.start.col) as usize, (last - first + 1) as usize)?;
                Range::from_bounds(range.start.row, start, range.end.row, end)
            }
        }
    };

    Ok(Some(TableUpdate {
        index,
        range: Some(new_range),
        columns,
        inserted_columns,
    }))
}

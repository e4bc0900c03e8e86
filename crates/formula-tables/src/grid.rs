use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formula_text::normalize_formula_text;
use crate::{Cell, CellKey, CellRef, CellValue, EditAxis, Range, SheetLimits};

/// Errors raised by [`SparseGrid`] writes and shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell {cell} is outside the worksheet limits")]
    OutOfBounds { cell: CellRef },
    #[error("shifting {axis} from index {from} by {delta} would move cells past the worksheet edge")]
    ShiftOutOfBounds { axis: EditAxis, from: u32, delta: i64 },
}

/// Sparse cell storage for one worksheet.
///
/// Only non-empty cells are stored; an absent key is an empty cell. Keys are
/// row-major so whole row bands can be scanned or split off cheaply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseGrid {
    #[serde(default)]
    limits: SheetLimits,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    cells: BTreeMap<CellKey, Cell>,
}

impl SparseGrid {
    pub fn new(limits: SheetLimits) -> Self {
        Self {
            limits,
            cells: BTreeMap::new(),
        }
    }

    pub fn limits(&self) -> &SheetLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, cell: CellRef) -> Option<&Cell> {
        if !self.limits.contains(cell) {
            return None;
        }
        self.cells.get(&CellKey::from(cell))
    }

    /// Value of `cell`, [`CellValue::Empty`] when nothing is stored.
    pub fn value(&self, cell: CellRef) -> CellValue {
        self.get(cell).map(|c| c.value.clone()).unwrap_or_default()
    }

    pub fn formula(&self, cell: CellRef) -> Option<&str> {
        self.get(cell).and_then(|c| c.formula.as_deref())
    }

    /// Store `record` at `cell`, removing the entry if the record is truly empty.
    pub fn set(&mut self, cell: CellRef, record: Cell) -> Result<(), GridError> {
        if !self.limits.contains(cell) {
            return Err(GridError::OutOfBounds { cell });
        }
        self.put(cell, record);
        Ok(())
    }

    /// Set a literal value, dropping any formula but keeping the style.
    pub fn set_value(&mut self, cell: CellRef, value: CellValue) -> Result<(), GridError> {
        let style_id = self.get(cell).map_or(0, |c| c.style_id);
        self.set(
            cell,
            Cell {
                value,
                formula: None,
                style_id,
            },
        )
    }

    /// Set or clear the formula of `cell`. Formula text is normalized first.
    pub fn set_formula(&mut self, cell: CellRef, formula: Option<String>) -> Result<(), GridError> {
        let mut record = self.get(cell).cloned().unwrap_or_default();
        record.formula = formula
            .map(|f| normalize_formula_text(&f))
            .filter(|f| !f.is_empty());
        if record.formula.is_some() {
            record.value = CellValue::Empty;
        }
        self.set(cell, record)
    }

    pub fn clear(&mut self, cell: CellRef) -> Option<Cell> {
        if !self.limits.contains(cell) {
            return None;
        }
        self.cells.remove(&CellKey::from(cell))
    }

    /// Write without a bounds check. Callers have already validated `cell`.
    pub(crate) fn put(&mut self, cell: CellRef, record: Cell) {
        debug_assert!(self.limits.contains(cell));
        let key = CellKey::from(cell);
        if record.is_truly_empty() {
            self.cells.remove(&key);
        } else {
            self.cells.insert(key, record);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(k, c)| (k.to_ref(), c))
    }

    /// Stored cells inside `range`, row-major.
    pub fn iter_range(&self, range: Range) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.band(range.start.row, range.end.row)
            .filter(move |(cell, _)| range.contains(*cell))
    }

    pub(crate) fn formulas_mut(&mut self) -> impl Iterator<Item = (CellRef, &mut String)> {
        self.cells
            .iter_mut()
            .filter_map(|(k, c)| c.formula.as_mut().map(|f| (k.to_ref(), f)))
    }

    pub fn is_region_empty(&self, range: Range) -> bool {
        self.iter_range(range).next().is_none()
    }

    /// Bounding box of every stored cell.
    pub fn used_range(&self) -> Option<Range> {
        let first_row = self.cells.keys().next()?.row();
        let last_row = self.cells.keys().next_back()?.row();
        let (min_col, max_col) = self
            .cells
            .keys()
            .fold((u32::MAX, 0), |(lo, hi), k| (lo.min(k.col()), hi.max(k.col())));
        Some(Range::from_bounds(first_row, min_col, last_row, max_col))
    }

    /// Last occupied row at or below `from_row`.
    pub fn last_row_from(&self, from_row: u32) -> Option<u32> {
        if from_row >= self.limits.max_rows {
            return None;
        }
        self.cells
            .range(CellKey::new(from_row, 0)..)
            .next_back()
            .map(|(k, _)| k.row())
    }

    /// Last occupied column at or right of `from_col`, across all rows.
    pub fn last_col_from(&self, from_col: u32) -> Option<u32> {
        self.cells
            .keys()
            .map(|k| k.col())
            .filter(|col| *col >= from_col)
            .max()
    }

    /// Remove every stored cell inside `range`. Returns the number removed.
    pub fn clear_region(&mut self, range: Range) -> usize {
        let full_width = range.start.col == 0 && range.end.col >= self.limits.last_col();
        if full_width {
            return self.clear_rows(range.start.row, range.end.row);
        }
        let doomed: Vec<CellKey> = self
            .band(range.start.row, range.end.row)
            .filter(|(cell, _)| range.contains(*cell))
            .map(|(cell, _)| CellKey::from(cell))
            .collect();
        for key in &doomed {
            self.cells.remove(key);
        }
        doomed.len()
    }

    /// Move every cell in rows `>= from_row` by `delta` rows.
    ///
    /// A negative `delta` first discards the `|delta|` rows directly above
    /// `from_row`, which the moved rows then fill. Rows vacated by a positive
    /// shift are left empty. Bounds are checked before anything moves.
    pub fn shift_rows(&mut self, from_row: u32, delta: i64) -> Result<usize, GridError> {
        let err = GridError::ShiftOutOfBounds {
            axis: EditAxis::Rows,
            from: from_row,
            delta,
        };
        if delta == 0 {
            return Ok(0);
        }
        if delta < 0 {
            let band_start = u32::try_from(i64::from(from_row) + delta).map_err(|_| err)?;
            if from_row > band_start {
                self.clear_rows(band_start, from_row - 1);
            }
        } else if let Some(last) = self.last_row_from(from_row) {
            if i64::from(last) + delta > i64::from(self.limits.last_row()) {
                return Err(err);
            }
        }

        let mut keys: Vec<CellKey> = if from_row < self.limits.max_rows {
            self.cells
                .range(CellKey::new(from_row, 0)..)
                .map(|(k, _)| *k)
                .collect()
        } else {
            Vec::new()
        };
        // Walk against the shift direction so no unmoved cell is overwritten.
        if delta > 0 {
            keys.reverse();
        }
        log::trace!("shifting {} cells from row {from_row} by {delta}", keys.len());
        for key in &keys {
            if let Some(record) = self.cells.remove(key) {
                let row = (i64::from(key.row()) + delta) as u32;
                self.cells.insert(CellKey::new(row, key.col()), record);
            }
        }
        Ok(keys.len())
    }

    /// Move every cell in columns `>= from_col` (all rows) by `delta` columns.
    ///
    /// Same contract as [`SparseGrid::shift_rows`] on the column axis.
    pub fn shift_columns(&mut self, from_col: u32, delta: i64) -> Result<usize, GridError> {
        let err = GridError::ShiftOutOfBounds {
            axis: EditAxis::Cols,
            from: from_col,
            delta,
        };
        if delta == 0 {
            return Ok(0);
        }
        if delta < 0 {
            let band_start = u32::try_from(i64::from(from_col) + delta).map_err(|_| err)?;
            if from_col > band_start {
                self.clear_cols(band_start, from_col - 1);
            }
        } else if let Some(last) = self.last_col_from(from_col) {
            if i64::from(last) + delta > i64::from(self.limits.last_col()) {
                return Err(err);
            }
        }

        let mut keys: Vec<CellKey> = self
            .cells
            .keys()
            .copied()
            .filter(|k| k.col() >= from_col)
            .collect();
        if delta > 0 {
            keys.sort_by_key(|k| std::cmp::Reverse(k.col()));
        } else {
            keys.sort_by_key(|k| k.col());
        }
        log::trace!("shifting {} cells from column {from_col} by {delta}", keys.len());
        for key in &keys {
            if let Some(record) = self.cells.remove(key) {
                let col = (i64::from(key.col()) + delta) as u32;
                self.cells.insert(CellKey::new(key.row(), col), record);
            }
        }
        Ok(keys.len())
    }

    fn band(&self, first_row: u32, last_row: u32) -> impl Iterator<Item = (CellRef, &Cell)> {
        let last_row = last_row.min(self.limits.last_row());
        let bounds = (first_row <= last_row)
            .then(|| CellKey::new(first_row, 0)..=CellKey::new(last_row, self.limits.last_col()));
        bounds
            .into_iter()
            .flat_map(move |b| self.cells.range(b))
            .map(|(k, c)| (k.to_ref(), c))
    }

    fn clear_rows(&mut self, first_row: u32, last_row: u32) -> usize {
        if first_row > last_row || first_row >= self.limits.max_rows {
            return 0;
        }
        let mut doomed = self.cells.split_off(&CellKey::new(first_row, 0));
        if last_row < self.limits.last_row() {
            let mut kept = doomed.split_off(&CellKey::new(last_row + 1, 0));
            self.cells.append(&mut kept);
        }
        doomed.len()
    }

    fn clear_cols(&mut self, first_col: u32, last_col: u32) -> usize {
        let before = self.cells.len();
        self.cells
            .retain(|k, _| k.col() < first_col || k.col() > last_col);
        before - self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    fn grid_with(values: &[(&str, f64)]) -> SparseGrid {
        let mut grid = SparseGrid::new(SheetLimits::new(100, 26).unwrap());
        for (a1, v) in values {
            grid.set_value(cell(a1), CellValue::Number(*v)).unwrap();
        }
        grid
    }

    #[test]
    fn empty_writes_do_not_materialize_entries() {
        let mut grid = grid_with(&[]);
        grid.set_value(cell("B2"), CellValue::Empty).unwrap();
        assert!(grid.is_empty());
        grid.set_value(cell("B2"), CellValue::Number(1.0)).unwrap();
        grid.set_value(cell("B2"), CellValue::Empty).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn writes_outside_limits_fail() {
        let mut grid = grid_with(&[]);
        assert_eq!(
            grid.set_value(CellRef::new(100, 0), 1.0.into()),
            Err(GridError::OutOfBounds {
                cell: CellRef::new(100, 0)
            })
        );
    }

    #[test]
    fn shift_rows_down_does_not_clobber_unmoved_rows() {
        let mut grid = grid_with(&[("A1", 1.0), ("A2", 2.0), ("A3", 3.0), ("C3", 33.0)]);
        assert_eq!(grid.shift_rows(1, 1).unwrap(), 3);
        assert_eq!(grid.value(cell("A1")), CellValue::Number(1.0));
        assert_eq!(grid.value(cell("A2")), CellValue::Empty);
        assert_eq!(grid.value(cell("A3")), CellValue::Number(2.0));
        assert_eq!(grid.value(cell("A4")), CellValue::Number(3.0));
        assert_eq!(grid.value(cell("C4")), CellValue::Number(33.0));
    }

    #[test]
    fn shift_rows_up_discards_the_band_above() {
        let mut grid = grid_with(&[("A1", 1.0), ("A2", 2.0), ("A3", 3.0), ("A5", 5.0)]);
        grid.shift_rows(3, -2).unwrap();
        assert_eq!(grid.value(cell("A1")), CellValue::Number(1.0));
        assert_eq!(grid.value(cell("A2")), CellValue::Empty);
        assert_eq!(grid.value(cell("A3")), CellValue::Number(5.0));
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn shift_rows_rejects_overflow_without_moving() {
        let mut grid = grid_with(&[("A99", 1.0), ("A1", 2.0)]);
        let before = grid.clone();
        assert!(grid.shift_rows(0, 2).is_err());
        assert_eq!(grid, before);
        assert!(grid.shift_rows(1, -2).is_err());
        assert_eq!(grid, before);
    }

    #[test]
    fn shift_columns_moves_all_rows() {
        let mut grid = grid_with(&[("A1", 1.0), ("B1", 2.0), ("C50", 3.0), ("D7", 4.0)]);
        grid.shift_columns(2, -1).unwrap();
        assert_eq!(grid.value(cell("A1")), CellValue::Number(1.0));
        assert_eq!(grid.value(cell("B1")), CellValue::Empty);
        assert_eq!(grid.value(cell("B50")), CellValue::Number(3.0));
        assert_eq!(grid.value(cell("C7")), CellValue::Number(4.0));

        grid.shift_columns(0, 2).unwrap();
        assert_eq!(grid.value(cell("C1")), CellValue::Number(1.0));
        assert_eq!(grid.value(cell("D50")), CellValue::Number(3.0));
        assert_eq!(grid.value(cell("E7")), CellValue::Number(4.0));
    }

    #[test]
    fn clear_region_only_touches_the_region() {
        let mut grid = grid_with(&[("A1", 1.0), ("B2", 2.0), ("C3", 3.0), ("D4", 4.0)]);
        assert_eq!(grid.clear_region(Range::from_a1("B2:C3").unwrap()), 2);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.value(cell("D4")), CellValue::Number(4.0));

        assert_eq!(grid.clear_region(Range::from_a1("A1:Z1").unwrap()), 1);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn used_range_and_last_positions() {
        let grid = grid_with(&[("C2", 1.0), ("A9", 2.0), ("F5", 3.0)]);
        assert_eq!(grid.used_range(), Some(Range::from_a1("A2:F9").unwrap()));
        assert_eq!(grid.last_row_from(3), Some(8));
        assert_eq!(grid.last_row_from(9), None);
        assert_eq!(grid.last_col_from(3), Some(5));
    }

    #[test]
    fn set_formula_normalizes_text() {
        let mut grid = grid_with(&[]);
        grid.set_formula(cell("A1"), Some(" =SUM(B1:B3) ".into())).unwrap();
        assert_eq!(grid.formula(cell("A1")), Some("SUM(B1:B3)"));
        grid.set_formula(cell("A1"), None).unwrap();
        assert!(grid.is_empty());
    }
}

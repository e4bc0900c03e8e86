//! Relocate A1 references inside formula text after rows or columns shift.
//!
//! This is a lexical rewrite, not a parser: it recognises cell references
//! (`B7`, `$C$3`), cell ranges (`A1:B9`), whole columns and rows (`C:C`,
//! `$2:$5`) and sheet-qualified forms (`Sheet1!A1`, `'My Sheet'!A1:A4`),
//! and leaves everything else
//! untouched. String literals and bracketed structured references
//! (`Table1[[#Totals],[Qty]]`) are copied verbatim.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{col_to_name, name_to_col};
use crate::value::text_eq_case_insensitive;
use crate::{ErrorValue, SheetLimits, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

/// Which grid axis a structural edit moves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAxis {
    Rows,
    Cols,
}

impl fmt::Display for EditAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditAxis::Rows => f.write_str("rows"),
            EditAxis::Cols => f.write_str("columns"),
        }
    }
}

/// A worksheet-wide row or column insertion/deletion.
///
/// Positions are 0-indexed. Deletions remove `[row, row + count)` (or the
/// column equivalent); insertions push everything at or after `row` down by
/// `count`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralEdit {
    InsertRows { row: u32, count: u32 },
    DeleteRows { row: u32, count: u32 },
    InsertCols { col: u32, count: u32 },
    DeleteCols { col: u32, count: u32 },
}

impl StructuralEdit {
    pub const fn axis(&self) -> EditAxis {
        match self {
            StructuralEdit::InsertRows { .. } | StructuralEdit::DeleteRows { .. } => EditAxis::Rows,
            StructuralEdit::InsertCols { .. } | StructuralEdit::DeleteCols { .. } => EditAxis::Cols,
        }
    }

    /// First row/column affected by the edit.
    pub const fn position(&self) -> u32 {
        match *self {
            StructuralEdit::InsertRows { row, .. } | StructuralEdit::DeleteRows { row, .. } => row,
            StructuralEdit::InsertCols { col, .. } | StructuralEdit::DeleteCols { col, .. } => col,
        }
    }

    pub const fn count(&self) -> u32 {
        match *self {
            StructuralEdit::InsertRows { count, .. }
            | StructuralEdit::DeleteRows { count, .. }
            | StructuralEdit::InsertCols { count, .. }
            | StructuralEdit::DeleteCols { count, .. } => count,
        }
    }

    pub const fn is_delete(&self) -> bool {
        matches!(
            self,
            StructuralEdit::DeleteRows { .. } | StructuralEdit::DeleteCols { .. }
        )
    }

    /// Signed distance that content after the band moves.
    pub fn delta(&self) -> i64 {
        let count = i64::from(self.count());
        if self.is_delete() {
            -count
        } else {
            count
        }
    }

    /// Last row/column of a deleted band (inclusive).
    fn delete_end(&self) -> u32 {
        self.position()
            .saturating_add(self.count().saturating_sub(1))
    }

    /// Map a single row/column index on this edit's axis.
    ///
    /// Returns `None` when the index falls inside a deleted band.
    pub fn adjust_index(&self, index: u32) -> Option<u32> {
        let at = self.position();
        let count = self.count();
        if self.is_delete() {
            if index < at {
                Some(index)
            } else if index > self.delete_end() {
                Some(index - count)
            } else {
                None
            }
        } else if index >= at {
            index.checked_add(count)
        } else {
            Some(index)
        }
    }

    /// Map an inclusive `[start, end]` span on this edit's axis.
    ///
    /// Insertions strictly inside the span grow it; deletions that overlap
    /// part of the span shrink it; a span fully inside a deleted band maps to
    /// `None`.
    pub fn adjust_span(&self, start: u32, end: u32) -> Option<(u32, u32)> {
        let at = self.position();
        let count = self.count();
        if !self.is_delete() {
            let new_start = if start >= at { start.checked_add(count)? } else { start };
            let new_end = if end >= at { end.checked_add(count)? } else { end };
            return Some((new_start, new_end));
        }

        let del_end = self.delete_end();
        if end < at {
            return Some((start, end));
        }
        if start > del_end {
            return Some((start - count, end - count));
        }
        if start >= at && end <= del_end {
            return None;
        }

        let mut new_start = start;
        let mut new_end = end;

        if start >= at && start <= del_end {
            new_start = at;
        }

        if end >= at && end <= del_end {
            if at == 0 {
                return None;
            }
            new_end = at - 1;
        } else if end > del_end {
            new_end = end - count;
        }

        if new_start > new_end {
            None
        } else {
            Some((new_start, new_end))
        }
    }
}

impl fmt::Display for StructuralEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_delete() { "delete" } else { "insert" };
        let (first, last) = (self.position(), self.position() + self.count().saturating_sub(1));
        match self.axis() {
            EditAxis::Rows => write!(f, "{verb} rows {}:{}", first + 1, last + 1),
            EditAxis::Cols => write!(f, "{verb} columns {}:{}", col_to_name(first), col_to_name(last)),
        }
    }
}

/// Result of rewriting one formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormulaRewrite {
    pub formula: String,
    pub changed: bool,
    /// At least one reference pointed into a deleted band and became `#REF!`.
    pub invalidated: bool,
}

/// Rewrite `formula` so its references keep pointing at the same cells after `edit`.
///
/// `sheet_name` is the worksheet the edit applied to; references qualified
/// with any other sheet are left alone. References whose cells were deleted
/// become `#REF!`. Insertions never push a reference past the last row or
/// column of `limits`; it stops at the sheet edge.
pub fn rewrite_formula_for_structural_edit(
    formula: &str,
    sheet_name: &str,
    edit: &StructuralEdit,
    limits: &SheetLimits,
) -> FormulaRewrite {
    let bytes = formula.as_bytes();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut invalidated = false;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = scan_string_literal(bytes, i);
                out.push_str(&formula[i..end]);
                i = end;
            }
            b'[' => {
                let end = scan_brackets(bytes, i);
                out.push_str(&formula[i..end]);
                i = end;
            }
            b'\'' => {
                let name_end = scan_quoted_name(bytes, i);
                if bytes.get(name_end) == Some(&b'!') {
                    let raw = &formula[i + 1..name_end.saturating_sub(1).max(i + 1)];
                    let sheet = raw.replace("''", "'");
                    let prefix_end = name_end + 1;
                    let applies = text_eq_case_insensitive(&sheet, sheet_name);
                    i = emit_reference(
                        formula,
                        i,
                        prefix_end,
                        applies,
                        edit,
                        limits,
                        &mut out,
                        &mut invalidated,
                    );
                } else {
                    out.push_str(&formula[i..name_end]);
                    i = name_end;
                }
            }
            b if is_word_byte(b) => {
                let word_end = scan_word(bytes, i);
                if bytes.get(word_end) == Some(&b'!') {
                    let applies = text_eq_case_insensitive(&formula[i..word_end], sheet_name);
                    i = emit_reference(
                        formula,
                        i,
                        word_end + 1,
                        applies,
                        edit,
                        limits,
                        &mut out,
                        &mut invalidated,
                    );
                } else {
                    i = emit_reference(
                        formula,
                        i,
                        i,
                        true,
                        edit,
                        limits,
                        &mut out,
                        &mut invalidated,
                    );
                }
            }
            _ => {
                let ch_len = utf8_len(bytes[i]);
                out.push_str(&formula[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    let changed = out != formula;
    FormulaRewrite {
        formula: out,
        changed,
        invalidated,
    }
}

/// Emit the reference starting at `ref_start` (after an optional sheet prefix
/// spanning `prefix_start..ref_start`) and return the index after it.
#[allow(clippy::too_many_arguments)]
fn emit_reference(
    formula: &str,
    prefix_start: usize,
    ref_start: usize,
    applies: bool,
    edit: &StructuralEdit,
    limits: &SheetLimits,
    out: &mut String,
    invalidated: &mut bool,
) -> usize {
    let bytes = formula.as_bytes();
    let first_end = scan_word(bytes, ref_start);
    let parsed = if bytes.get(first_end) == Some(&b'(') {
        None
    } else {
        parse_reference(formula, ref_start, first_end)
    };
    let Some((reference, end)) = parsed else {
        let end = first_end.max(ref_start);
        out.push_str(&formula[prefix_start..end]);
        return end;
    };

    if !applies {
        out.push_str(&formula[prefix_start..end]);
        return end;
    }

    match reference.relocate(edit, limits) {
        Some(reference) => {
            out.push_str(&formula[prefix_start..ref_start]);
            out.push_str(&reference.to_string());
        }
        None => {
            *invalidated = true;
            out.push_str(ErrorValue::Ref.as_str());
        }
    }
    end
}

/// Parse the reference whose first word spans `start..first_end`, taking a
/// `:`-joined second word when it forms a range. Returns the reference and the
/// index after it.
fn parse_reference(formula: &str, start: usize, first_end: usize) -> Option<(Reference, usize)> {
    let bytes = formula.as_bytes();
    let first = &formula[start..first_end];
    let second = if bytes.get(first_end) == Some(&b':') {
        let second_end = scan_word(bytes, first_end + 1);
        (bytes.get(second_end) != Some(&b'('))
            .then(|| (&formula[first_end + 1..second_end], second_end))
    } else {
        None
    };

    if let Some(a) = parse_cell_token(first) {
        if let Some((word, end)) = second {
            if let Some(b) = parse_cell_token(word) {
                return Some((Reference::Area(a, b), end));
            }
        }
        return Some((Reference::Cell(a), first_end));
    }

    // Whole columns (`C:C`) and whole rows (`2:2`) only exist as ranges.
    let (word, end) = second?;
    for axis in [EditAxis::Cols, EditAxis::Rows] {
        if let (Some(a), Some(b)) = (parse_line_token(first, axis), parse_line_token(word, axis)) {
            return Some((Reference::Lines { axis, start: a, end: b }, end));
        }
    }
    None
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CellToken {
    col: u32,
    col_abs: bool,
    row: u32,
    row_abs: bool,
}

impl fmt::Display for CellToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.col_abs {
            f.write_str("$")?;
        }
        f.write_str(&col_to_name(self.col))?;
        if self.row_abs {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row + 1)
    }
}

/// One side of a whole-column or whole-row range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct LineToken {
    index: u32,
    abs: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Reference {
    Cell(CellToken),
    Area(CellToken, CellToken),
    Lines {
        axis: EditAxis,
        start: LineToken,
        end: LineToken,
    },
}

impl Reference {
    /// Where this reference points after `edit`, or `None` if its cells were deleted.
    fn relocate(self, edit: &StructuralEdit, limits: &SheetLimits) -> Option<Reference> {
        match self {
            Reference::Cell(cell) => relocate_cell(cell, edit, limits).map(Reference::Cell),
            Reference::Area(a, b) => {
                relocate_area(a, b, edit, limits).map(|(a, b)| Reference::Area(a, b))
            }
            Reference::Lines { axis, start, end } => {
                relocate_lines(axis, start, end, edit, limits)
                    .map(|(start, end)| Reference::Lines { axis, start, end })
            }
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell(cell) => write!(f, "{cell}"),
            Reference::Area(a, b) => write!(f, "{a}:{b}"),
            Reference::Lines { axis, start, end } => {
                for (idx, line) in [start, end].into_iter().enumerate() {
                    if idx == 1 {
                        f.write_str(":")?;
                    }
                    if line.abs {
                        f.write_str("$")?;
                    }
                    match axis {
                        EditAxis::Cols => f.write_str(&col_to_name(line.index))?,
                        EditAxis::Rows => write!(f, "{}", line.index + 1)?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn parse_cell_token(word: &str) -> Option<CellToken> {
    let bytes = word.as_bytes();
    let mut idx = 0usize;
    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        idx += 1;
    }
    let col_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
        idx += 1;
    }
    let col_len = idx - col_start;
    if col_len == 0 || col_len > 3 {
        return None;
    }
    let col = name_to_col(&word[col_start..idx]).ok()?;
    let row_abs = bytes.get(idx) == Some(&b'$');
    if row_abs {
        idx += 1;
    }
    let row_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == row_start || idx != bytes.len() {
        return None;
    }
    let row_1_based: u32 = word[row_start..idx].parse().ok()?;
    if row_1_based == 0 || row_1_based > EXCEL_MAX_ROWS || col >= EXCEL_MAX_COLS {
        return None;
    }
    Some(CellToken {
        col,
        col_abs,
        row: row_1_based - 1,
        row_abs,
    })
}

/// Parse `C`/`$C` (columns) or `2`/`$2` (rows).
fn parse_line_token(word: &str, axis: EditAxis) -> Option<LineToken> {
    let (abs, body) = match word.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    if body.is_empty() {
        return None;
    }
    let index = match axis {
        EditAxis::Cols => {
            if body.len() > 3 || !body.bytes().all(|b| b.is_ascii_alphabetic()) {
                return None;
            }
            name_to_col(body).ok().filter(|col| *col < EXCEL_MAX_COLS)?
        }
        EditAxis::Rows => {
            if !body.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let row: u32 = body.parse().ok()?;
            if row == 0 || row > EXCEL_MAX_ROWS {
                return None;
            }
            row - 1
        }
    };
    Some(LineToken { index, abs })
}

/// Map an inclusive span on the edit's axis.
///
/// Deletions follow [`StructuralEdit::adjust_span`]. On insertion a coordinate
/// pushed past `last` stops at `last` (or where it already was, if beyond).
fn relocate_span(edit: &StructuralEdit, start: u32, end: u32, last: u32) -> Option<(u32, u32)> {
    if edit.is_delete() {
        return edit.adjust_span(start, end);
    }
    let (new_start, new_end) = edit.adjust_span(start, end).unwrap_or((start, end));
    Some((new_start.min(last.max(start)), new_end.min(last.max(end))))
}

fn last_index(axis: EditAxis, limits: &SheetLimits) -> u32 {
    match axis {
        EditAxis::Rows => limits.last_row(),
        EditAxis::Cols => limits.last_col(),
    }
}

fn relocate_cell(
    mut cell: CellToken,
    edit: &StructuralEdit,
    limits: &SheetLimits,
) -> Option<CellToken> {
    let last = last_index(edit.axis(), limits);
    let relocate = |index: u32| {
        if edit.is_delete() {
            edit.adjust_index(index)
        } else {
            let moved = edit.adjust_index(index).unwrap_or(index);
            Some(moved.min(last.max(index)))
        }
    };
    match edit.axis() {
        EditAxis::Rows => cell.row = relocate(cell.row)?,
        EditAxis::Cols => cell.col = relocate(cell.col)?,
    }
    Some(cell)
}

fn relocate_area(
    mut a: CellToken,
    mut b: CellToken,
    edit: &StructuralEdit,
    limits: &SheetLimits,
) -> Option<(CellToken, CellToken)> {
    // Normalize so `a` is the top-left corner; `$` markers travel with their coordinate.
    if a.row > b.row {
        core::mem::swap(&mut a.row, &mut b.row);
        core::mem::swap(&mut a.row_abs, &mut b.row_abs);
    }
    if a.col > b.col {
        core::mem::swap(&mut a.col, &mut b.col);
        core::mem::swap(&mut a.col_abs, &mut b.col_abs);
    }
    let last = last_index(edit.axis(), limits);
    match edit.axis() {
        EditAxis::Rows => (a.row, b.row) = relocate_span(edit, a.row, b.row, last)?,
        EditAxis::Cols => (a.col, b.col) = relocate_span(edit, a.col, b.col, last)?,
    }
    Some((a, b))
}

fn relocate_lines(
    axis: EditAxis,
    mut start: LineToken,
    mut end: LineToken,
    edit: &StructuralEdit,
    limits: &SheetLimits,
) -> Option<(LineToken, LineToken)> {
    if axis != edit.axis() {
        return Some((start, end));
    }
    if start.index > end.index {
        core::mem::swap(&mut start, &mut end);
    }
    let last = last_index(axis, limits);
    (start.index, end.index) = relocate_span(edit, start.index, end.index, last)?;
    Some((start, end))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$' || b == b'\\'
}

fn scan_word(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && is_word_byte(bytes[i]) {
        i += 1;
    }
    i
}

fn scan_string_literal(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn scan_quoted_name(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn scan_brackets(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            // `'` escapes the next character inside structured references.
            b'\'' => {
                i += 2;
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

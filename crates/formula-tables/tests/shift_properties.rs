use std::collections::BTreeMap;

use formula_tables::{
    CellRef, CellValue, Range, SheetLimits, SparseGrid, TableError, TotalsRowFunction, Worksheet,
};
use proptest::prelude::*;

fn arb_cells(rows: u32, cols: u32) -> impl Strategy<Value = BTreeMap<(u32, u32), f64>> {
    prop::collection::btree_map((0..rows, 0..cols), -1000.0f64..1000.0, 0..40)
}

fn grid_from(cells: &BTreeMap<(u32, u32), f64>) -> SparseGrid {
    let mut grid = SparseGrid::new(SheetLimits::default());
    for (&(row, col), &n) in cells {
        grid.set_value(CellRef::new(row, col), CellValue::Number(n))
            .unwrap();
    }
    grid
}

fn snapshot(grid: &SparseGrid) -> BTreeMap<(u32, u32), CellValue> {
    grid.iter()
        .map(|(cell, record)| ((cell.row, cell.col), record.value.clone()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn row_delete_moves_everything_below_the_band(
        cells in arb_cells(30, 8),
        band_start in 0u32..25,
        count in 1u32..6,
    ) {
        let mut grid = grid_from(&cells);
        grid.shift_rows(band_start + count, -i64::from(count)).unwrap();

        let expected: BTreeMap<(u32, u32), CellValue> = cells
            .iter()
            .filter(|((row, _), _)| *row < band_start || *row >= band_start + count)
            .map(|(&(row, col), &n)| {
                let row = if row >= band_start + count { row - count } else { row };
                ((row, col), CellValue::Number(n))
            })
            .collect();
        prop_assert_eq!(snapshot(&grid), expected);
    }

    #[test]
    fn column_insert_leaves_a_blank_band(
        cells in arb_cells(10, 20),
        at in 0u32..20,
        count in 1u32..5,
    ) {
        let mut grid = grid_from(&cells);
        grid.shift_columns(at, i64::from(count)).unwrap();

        let band = Range::new(CellRef::new(0, at), CellRef::new(9, at + count - 1));
        prop_assert!(grid.is_region_empty(band));
        prop_assert_eq!(grid.len(), cells.len());
        for (&(row, col), &n) in &cells {
            let col = if col >= at { col + count } else { col };
            prop_assert_eq!(grid.value(CellRef::new(row, col)), CellValue::Number(n));
        }
    }

    #[test]
    fn table_row_delete_shrinks_by_count_or_changes_nothing(
        height in 2u32..20,
        start in 0i64..22,
        count in 0i64..22,
    ) {
        let mut sheet = Worksheet::new(1, "Sheet1");
        let range = Range::new(CellRef::new(0, 0), CellRef::new(height - 1, 2));
        for cell in range.iter() {
            sheet.set_value(cell, f64::from(cell.row * 10 + cell.col)).unwrap();
        }
        let id = sheet.add_table("Data", range).unwrap();
        let before = serde_json::to_value(&sheet).unwrap();
        let data_rows = i64::from(height - 1);

        let result = sheet.edit_table(id).unwrap().delete_rows(start, count);
        let table = sheet.table(id).unwrap();
        let new_height = i64::from(table.range.unwrap().height());

        if count == 0 {
            prop_assert!(result.is_ok());
            prop_assert_eq!(new_height, i64::from(height));
        } else if start + count > data_rows {
            prop_assert!(
                matches!(result, Err(TableError::ExceedsTableBounds { .. })),
                "{:?}", result
            );
            prop_assert_eq!(serde_json::to_value(&sheet).unwrap(), before);
        } else if count >= data_rows {
            prop_assert_eq!(result, Err(TableError::RangeCollapsed));
            prop_assert_eq!(serde_json::to_value(&sheet).unwrap(), before);
        } else {
            prop_assert!(result.is_ok(), "{:?}", result);
            prop_assert_eq!(new_height, i64::from(height) - count);
            prop_assert_eq!(table.data_row_count(), (data_rows - count) as u32);
        }
    }

    #[test]
    fn table_row_insert_grows_by_count(
        height in 2u32..20,
        start in 0i64..20,
        count in 0i64..6,
    ) {
        let mut sheet = Worksheet::new(1, "Sheet1");
        let range = Range::new(CellRef::new(0, 0), CellRef::new(height - 1, 1));
        let id = sheet.add_table("Data", range).unwrap();
        sheet.set_value(CellRef::new(height + 3, 0), "below").unwrap();
        let data_rows = i64::from(height - 1);

        let result = sheet.edit_table(id).unwrap().insert_rows(start, count);
        let new_height = i64::from(sheet.table(id).unwrap().range.unwrap().height());

        if count > 0 && start > data_rows {
            prop_assert!(result.unwrap_err().is_invalid_operation());
            prop_assert_eq!(new_height, i64::from(height));
        } else {
            prop_assert!(result.is_ok(), "{:?}", result);
            prop_assert_eq!(new_height, i64::from(height) + count);
            let below = CellRef::new(height + 3 + count as u32, 0);
            prop_assert_eq!(sheet.value(below), CellValue::from("below"));
        }
    }

    #[test]
    fn totals_row_stays_last_across_row_deletes(
        data_rows in 1u32..15,
        start in 0i64..18,
        count in 0i64..18,
    ) {
        let mut sheet = Worksheet::new(1, "Sheet1");
        for (col, header) in ["Item", "Qty"].into_iter().enumerate() {
            sheet.set_value(CellRef::new(0, col as u32), header).unwrap();
        }
        for row in 1..=data_rows {
            sheet.set_value(CellRef::new(row, 0), format!("Item {row}")).unwrap();
            sheet.set_value(CellRef::new(row, 1), row).unwrap();
        }
        let range = Range::new(CellRef::new(0, 0), CellRef::new(data_rows, 1));
        let id = sheet.add_table("Data", range).unwrap();
        {
            let mut editor = sheet.edit_table(id).unwrap();
            editor.set_totals_row_function(1, TotalsRowFunction::Sum).unwrap();
            editor.set_show_totals(true).unwrap();
        }
        let before = serde_json::to_value(&sheet).unwrap();

        let result = sheet.edit_table(id).unwrap().delete_rows(start, count);
        let table = sheet.table(id).unwrap();
        let range = table.range.unwrap();
        let totals = table.totals_range().unwrap();
        prop_assert_eq!(totals.start.row, range.end.row);
        prop_assert_eq!(
            sheet.value(CellRef::new(range.end.row, 0)),
            CellValue::from("Total")
        );
        prop_assert_eq!(
            sheet.formula(CellRef::new(range.end.row, 1)),
            Some("SUBTOTAL(109,Data[Qty])")
        );

        let changed = count > 0
            && start + count <= i64::from(data_rows) + 1
            && count < i64::from(data_rows);
        if changed {
            prop_assert!(result.is_ok(), "{:?}", result);
            prop_assert_eq!(i64::from(table.data_row_count()), i64::from(data_rows) - count);
            prop_assert!(sheet
                .cells()
                .is_region_empty(Range::new(
                    CellRef::new(range.end.row + 1, 0),
                    CellRef::new(data_rows + 1, 1),
                )));
        } else {
            prop_assert_eq!(result.is_ok(), count == 0, "{:?}", result);
            prop_assert_eq!(serde_json::to_value(&sheet).unwrap(), before);
        }
    }
}

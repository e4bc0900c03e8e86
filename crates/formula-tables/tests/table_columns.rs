use formula_tables::{
    CellRef, CellValue, EditAxis, Range, SheetLimits, TableError, TotalsRowFunction, Worksheet,
};
use pretty_assertions::assert_eq;

const HEADERS: [&str; 4] = ["Date", "NumValue", "StrValue", "NumFormattedValue"];

fn sheet_with_table(a1: &str, limits: SheetLimits) -> (Worksheet, u32) {
    let range = Range::from_a1(a1).unwrap();
    let mut sheet = Worksheet::with_limits(1, "TableDeleteCol", limits);
    for (i, header) in HEADERS.iter().enumerate() {
        sheet
            .set_value(CellRef::new(range.start.row, range.start.col + i as u32), *header)
            .unwrap();
    }
    for row in range.start.row + 1..=range.end.row {
        for i in 0..4 {
            sheet
                .set_value(CellRef::new(row, range.start.col + i), row * 10 + i)
                .unwrap();
        }
    }
    let id = sheet.add_table("Table1", range).unwrap();
    (sheet, id)
}

fn address(sheet: &Worksheet, id: u32) -> Option<String> {
    sheet.table(id).unwrap().range.map(|r| r.to_string())
}

fn column_names(sheet: &Worksheet, id: u32) -> Vec<String> {
    sheet
        .table(id)
        .unwrap()
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

#[test]
fn delete_columns_shift_content_to_the_left() {
    let (mut sheet, id) = sheet_with_table("A1:D100", SheetLimits::default());
    sheet.set_value_a1("E10", "Shift Me Left").unwrap();

    sheet.edit_table(id).unwrap().delete_column(0).unwrap();
    assert_eq!(address(&sheet, id).as_deref(), Some("A1:C100"));
    assert_eq!(sheet.value_a1("D10").unwrap(), CellValue::from("Shift Me Left"));
    assert_eq!(column_names(&sheet, id), ["NumValue", "StrValue", "NumFormattedValue"]);

    sheet.edit_table(id).unwrap().delete_columns(0, 2).unwrap();
    assert_eq!(address(&sheet, id).as_deref(), Some("A1:A100"));
    assert_eq!(sheet.value_a1("B10").unwrap(), CellValue::from("Shift Me Left"));
    assert_eq!(sheet.value_a1("C10").unwrap(), CellValue::Empty);
    assert_eq!(sheet.value_a1("A1").unwrap(), CellValue::from("NumFormattedValue"));
    assert_eq!(column_names(&sheet, id), ["NumFormattedValue"]);
}

#[test]
fn deleting_every_column_removes_the_table() {
    let (mut sheet, id) = sheet_with_table("B1:E100", SheetLimits::default());
    sheet.set_value_a1("F99", "Shift Me Left").unwrap();

    sheet.edit_table(id).unwrap().delete_columns(0, 4).unwrap();
    let table = sheet.table(id).unwrap();
    assert_eq!(table.range, None);
    assert!(table.is_deleted());
    assert!(table.columns.is_empty());
    assert_eq!(sheet.value_a1("B99").unwrap(), CellValue::from("Shift Me Left"));
    assert_eq!(sheet.cell_count(), 1);

    assert_eq!(sheet.prune_deleted_tables(), 1);
    assert!(sheet.tables().is_empty());
}

#[test]
fn delete_columns_validates_arguments_and_bounds() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::default());
    let before = serde_json::to_value(&sheet).unwrap();

    let mut editor = sheet.edit_table(id).unwrap();
    assert_eq!(editor.delete_column(-1), Err(TableError::NegativeOffset(-1)));
    assert_eq!(editor.delete_columns(0, -2), Err(TableError::NegativeCount(-2)));
    assert_eq!(
        editor.delete_columns(3, 2),
        Err(TableError::ExceedsTableBounds {
            axis: EditAxis::Cols,
            offset: 3,
            count: 2,
            available: 4,
        })
    );
    assert!(editor.delete_column(4).unwrap_err().is_invalid_operation());

    assert_eq!(serde_json::to_value(&sheet).unwrap(), before);
}

#[test]
fn deleted_columns_take_their_metadata_with_them() {
    let (mut sheet, id) = sheet_with_table("A1:D5", SheetLimits::default());
    {
        let mut editor = sheet.edit_table(id).unwrap();
        editor.set_totals_row_function(1, TotalsRowFunction::Sum).unwrap();
        editor.set_totals_row_function(3, TotalsRowFunction::Max).unwrap();
        editor.delete_column(1).unwrap();
    }
    let table = sheet.table(id).unwrap();
    let functions: Vec<TotalsRowFunction> =
        table.columns.iter().map(|c| c.totals_row_function).collect();
    assert_eq!(
        functions,
        [TotalsRowFunction::None, TotalsRowFunction::None, TotalsRowFunction::Max]
    );
}

#[test]
fn insert_columns_inside_and_at_the_edges() {
    let (mut sheet, id) = sheet_with_table("B1:E5", SheetLimits::default());
    sheet.set_value_a1("F3", "Shift Me Right").unwrap();

    sheet.edit_table(id).unwrap().insert_column(1).unwrap();
    assert_eq!(address(&sheet, id).as_deref(), Some("B1:F5"));
    assert_eq!(
        column_names(&sheet, id),
        ["Date", "Column1", "NumValue", "StrValue", "NumFormattedValue"]
    );
    assert_eq!(sheet.value_a1("C1").unwrap(), CellValue::from("Column1"));
    assert_eq!(sheet.value_a1("C3").unwrap(), CellValue::Empty);
    assert_eq!(sheet.value_a1("D3").unwrap(), CellValue::from(21));
    assert_eq!(sheet.value_a1("G3").unwrap(), CellValue::from("Shift Me Right"));

    sheet.edit_table(id).unwrap().insert_columns(5, 2).unwrap();
    assert_eq!(address(&sheet, id).as_deref(), Some("B1:H5"));
    assert_eq!(sheet.value_a1("G1").unwrap(), CellValue::from("Column2"));
    assert_eq!(sheet.value_a1("H1").unwrap(), CellValue::from("Column3"));
    assert_eq!(sheet.value_a1("I3").unwrap(), CellValue::from("Shift Me Right"));

    sheet.edit_table(id).unwrap().insert_column(0).unwrap();
    assert_eq!(address(&sheet, id).as_deref(), Some("B1:I5"));
    assert_eq!(sheet.value_a1("B1").unwrap(), CellValue::from("Column4"));
    assert_eq!(sheet.value_a1("C1").unwrap(), CellValue::from("Date"));

    let ids: Vec<u32> = sheet.table(id).unwrap().columns.iter().map(|c| c.id).collect();
    assert_eq!(ids, [8, 1, 5, 2, 3, 4, 6, 7]);
}

#[test]
fn insert_columns_respects_table_and_sheet_bounds() {
    let (mut sheet, id) = sheet_with_table("A1:D5", SheetLimits::new(100, 5).unwrap());

    let err = sheet.edit_table(id).unwrap().insert_column(5).unwrap_err();
    assert!(matches!(err, TableError::ExceedsTableBounds { axis: EditAxis::Cols, .. }));

    let err = sheet.edit_table(id).unwrap().insert_columns(0, 2).unwrap_err();
    assert_eq!(err, TableError::ExceedsSheetLimit);
    assert!(err.is_invalid_operation());

    sheet.edit_table(id).unwrap().insert_column(4).unwrap();
    assert_eq!(address(&sheet, id).as_deref(), Some("A1:E5"));
}

#[test]
fn insert_column_refused_when_content_would_fall_off_the_sheet() {
    let (mut sheet, id) = sheet_with_table("A1:C5", SheetLimits::new(100, 5).unwrap());
    sheet.set_value_a1("E2", "edge").unwrap();
    let before = serde_json::to_value(&sheet).unwrap();

    let err = sheet.edit_table(id).unwrap().insert_column(0).unwrap_err();
    assert_eq!(err, TableError::ExceedsSheetLimit);
    assert_eq!(serde_json::to_value(&sheet).unwrap(), before);
}

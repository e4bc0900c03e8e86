use formula_tables::{
    CellRef, CellValue, EditAxis, Range, SheetLimits, TableError, TotalsRowFunction, Worksheet,
};
use pretty_assertions::assert_eq;

fn sheet_with_table(a1: &str, limits: SheetLimits) -> (Worksheet, u32) {
    let range = Range::from_a1(a1).unwrap();
    let mut sheet = Worksheet::with_limits(1, "Sheet1", limits);
    for (i, header) in ["Item", "Qty", "Price", "Total"].iter().enumerate() {
        sheet
            .set_value(CellRef::new(range.start.row, range.start.col + i as u32), *header)
            .unwrap();
    }
    for row in range.start.row + 1..=range.end.row {
        sheet
            .set_value(CellRef::new(row, range.start.col), format!("Item {row}"))
            .unwrap();
        sheet
            .set_value(CellRef::new(row, range.start.col + 1), row)
            .unwrap();
    }
    let id = sheet.add_table("Orders", range).unwrap();
    (sheet, id)
}

fn address(sheet: &Worksheet, id: u32) -> String {
    sheet.table(id).unwrap().range.unwrap().to_string()
}

#[test]
fn insert_rows_push_content_down() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::default());
    sheet.set_value_a1("A12", "Shift Me Down").unwrap();

    sheet.edit_table(id).unwrap().insert_rows(0, 2).unwrap();
    assert_eq!(address(&sheet, id), "A1:D12");
    assert_eq!(sheet.value_a1("B2").unwrap(), CellValue::Empty);
    assert_eq!(sheet.value_a1("B3").unwrap(), CellValue::Empty);
    assert_eq!(sheet.value_a1("B4").unwrap(), CellValue::from(1));
    assert_eq!(sheet.value_a1("A14").unwrap(), CellValue::from("Shift Me Down"));
    assert_eq!(sheet.value_a1("A1").unwrap(), CellValue::from("Item"));
}

#[test]
fn insert_at_the_data_row_count_appends() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::default());

    sheet.edit_table(id).unwrap().insert_row(9).unwrap();
    assert_eq!(address(&sheet, id), "A1:D11");
    assert_eq!(sheet.value_a1("B10").unwrap(), CellValue::from(9));
    assert_eq!(sheet.value_a1("B11").unwrap(), CellValue::Empty);

    let err = sheet.edit_table(id).unwrap().insert_row(11).unwrap_err();
    assert_eq!(
        err,
        TableError::ExceedsTableBounds {
            axis: EditAxis::Rows,
            offset: 11,
            count: 1,
            available: 10,
        }
    );
}

#[test]
fn insert_rows_validates_arguments() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::default());
    let mut editor = sheet.edit_table(id).unwrap();
    assert!(editor.insert_row(-1).unwrap_err().is_argument_error());
    assert!(editor.insert_rows(0, -5).unwrap_err().is_argument_error());
}

#[test]
fn insert_rows_respect_the_row_limit() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::new(12, 26).unwrap());

    let err = sheet.edit_table(id).unwrap().insert_rows(0, 3).unwrap_err();
    assert_eq!(err, TableError::ExceedsSheetLimit);
    assert!(err.is_invalid_operation());

    sheet.edit_table(id).unwrap().insert_rows(0, 2).unwrap();
    assert_eq!(address(&sheet, id), "A1:D12");
}

#[test]
fn insert_rows_refused_when_content_below_would_fall_off() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::new(20, 26).unwrap());
    sheet.set_value_a1("F20", "bottom").unwrap();
    let before = serde_json::to_value(&sheet).unwrap();

    let err = sheet.edit_table(id).unwrap().insert_row(0).unwrap_err();
    assert_eq!(err, TableError::ExceedsSheetLimit);
    assert_eq!(serde_json::to_value(&sheet).unwrap(), before);
}

#[test]
fn inserted_rows_receive_calculated_column_formulas() {
    let (mut sheet, id) = sheet_with_table("A1:D4", SheetLimits::default());
    {
        let mut editor = sheet.edit_table(id).unwrap();
        editor.set_calculated_formula(3, Some("=[@Qty]*[@Price]")).unwrap();
        editor.insert_rows(1, 2).unwrap();
    }
    assert_eq!(address(&sheet, id), "A1:D6");
    for a1 in ["D2", "D3", "D4", "D5", "D6"] {
        assert_eq!(sheet.formula_a1(a1).unwrap(), Some("[@Qty]*[@Price]"), "{a1}");
    }
    assert_eq!(sheet.formula_a1("D7").unwrap(), None);
    assert_eq!(
        sheet.table(id).unwrap().columns[3].formula.as_deref(),
        Some("[@Qty]*[@Price]")
    );
}

#[test]
fn totals_row_follows_inserted_rows() {
    let (mut sheet, id) = sheet_with_table("A1:D4", SheetLimits::default());
    {
        let mut editor = sheet.edit_table(id).unwrap();
        editor.set_totals_row_function(1, TotalsRowFunction::Sum).unwrap();
        editor.set_show_totals(true).unwrap();
    }
    assert_eq!(address(&sheet, id), "A1:D5");
    assert_eq!(sheet.value_a1("A5").unwrap(), CellValue::from("Total"));
    assert_eq!(sheet.formula_a1("B5").unwrap(), Some("SUBTOTAL(109,Orders[Qty])"));

    sheet.edit_table(id).unwrap().insert_rows(3, 2).unwrap();
    assert_eq!(address(&sheet, id), "A1:D7");
    assert_eq!(sheet.value_a1("A5").unwrap(), CellValue::Empty);
    assert_eq!(sheet.value_a1("A7").unwrap(), CellValue::from("Total"));
    assert_eq!(sheet.formula_a1("B7").unwrap(), Some("SUBTOTAL(109,Orders[Qty])"));
    assert_eq!(sheet.table(id).unwrap().data_row_count(), 5);
}

#[test]
fn totals_row_can_be_toggled() {
    let (mut sheet, id) = sheet_with_table("A1:D4", SheetLimits::default());
    sheet.set_value_a1("C5", "occupied").unwrap();

    let err = sheet.edit_table(id).unwrap().set_show_totals(true).unwrap_err();
    assert_eq!(err, TableError::TotalsRowOccupied);

    sheet.clear_cell(CellRef::from_a1("C5").unwrap());
    {
        let mut editor = sheet.edit_table(id).unwrap();
        editor.set_show_totals(true).unwrap();
        editor.set_totals_row_function(2, TotalsRowFunction::Average).unwrap();
        editor.set_totals_row_function(3, TotalsRowFunction::CountNums).unwrap();
    }
    assert_eq!(sheet.formula_a1("C5").unwrap(), Some("SUBTOTAL(101,Orders[Price])"));
    assert_eq!(sheet.formula_a1("D5").unwrap(), Some("SUBTOTAL(102,Orders[Total])"));

    sheet
        .edit_table(id)
        .unwrap()
        .set_totals_row_function(2, TotalsRowFunction::None)
        .unwrap();
    assert_eq!(sheet.formula_a1("C5").unwrap(), None);

    sheet.edit_table(id).unwrap().set_show_totals(false).unwrap();
    let table = sheet.table(id).unwrap();
    assert!(!table.show_totals());
    assert_eq!(address(&sheet, id), "A1:D4");
    assert!(sheet.cells().is_region_empty(Range::from_a1("A5:D5").unwrap()));
}

#[test]
fn totals_row_needs_room_below_the_table() {
    let (mut sheet, id) = sheet_with_table("A1:D10", SheetLimits::new(10, 26).unwrap());
    let err = sheet.edit_table(id).unwrap().set_show_totals(true).unwrap_err();
    assert_eq!(err, TableError::ExceedsSheetLimit);

    let (mut sheet, id) = sheet_with_table("A1:D4", SheetLimits::default());
    sheet.add_table_a1("Below", "A5:B6").unwrap();
    let err = sheet.edit_table(id).unwrap().set_show_totals(true).unwrap_err();
    assert_eq!(err, TableError::OverlapsTable { name: "Below".into() });
}

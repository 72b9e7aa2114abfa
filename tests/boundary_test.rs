//! Boundary Tests for sheetmap
//!
//! 空のワークブック、ヘッダーのみのデータ、使用範囲がA1から始まらないシート、
//! データ範囲外の編集など、境界となる入力を検証します。

use rust_xlsxwriter::*;
use sheetmap::{
    CellValue, EngineBuilder, LogicalField, SheetMapError, SkipReason, WriteMode,
};
use std::io::Cursor;

// Helper module for generating test fixtures
mod fixtures {
    use super::*;

    /// Generate a workbook with a single empty sheet
    pub fn generate_empty_workbook() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a two-row template (header at row 1, data from row 2)
    pub fn generate_compact_template() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Título")?;
        worksheet.write_string(0, 1, "Precio")?;
        worksheet.write_string(0, 2, "Stock")?;
        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a source sheet that has only the header row
    pub fn generate_header_only_source() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Nombre Producto")?;
        worksheet.write_string(0, 1, "Precio")?;
        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a source sheet whose used range starts at C3
    ///
    /// Includes a blank header cell, a blank row, a date, and a boolean.
    pub fn generate_offset_source() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");

        worksheet.write_string(2, 2, "Nombre Producto")?;
        worksheet.write_string(2, 4, "PRECIO_FINAL")?;
        worksheet.write_string(2, 5, "Fecha alta")?;
        worksheet.write_string(2, 6, "Activo")?;

        worksheet.write_string(3, 2, "Zapato")?;
        worksheet.write_string(3, 3, "sin encabezado")?;
        worksheet.write_number(3, 4, 99.5)?;
        // 45306 = 2024-01-15
        worksheet.write_number_with_format(3, 5, 45306.0, &date_format)?;
        worksheet.write_boolean(3, 6, true)?;

        // 5行目は空行、6行目にデータ
        worksheet.write_string(5, 2, "Bota")?;
        worksheet.write_number(5, 4, 120.0)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a template whose header row starts at column C
    pub fn generate_offset_template() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(6, 2, "Título")?;
        worksheet.write_string(6, 3, "Precio")?;
        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a corrupted/invalid Excel file
    pub fn generate_corrupted_file() -> Vec<u8> {
        b"This is not a valid Excel file content".to_vec()
    }
}

#[test]
fn test_empty_workbook() {
    let engine = EngineBuilder::new().build().unwrap();
    let data = fixtures::generate_empty_workbook().unwrap();

    let template = engine.read_template(Cursor::new(data.clone())).unwrap();
    assert_eq!(template.row_count(), 0);
    assert!(engine.catalog(&template).fields.is_empty());

    let source = engine.read_source(Cursor::new(data)).unwrap();
    assert!(source.headers().is_empty());
    assert_eq!(source.row_count(), 0);

    // 何もマッピングできないため書き込みは拒否される
    let mut session = engine.session(template, source);
    assert!(session.unresolved_headers().is_empty());
    assert!(session.preview().rows.is_empty());
    assert!(matches!(
        session.write(WriteMode::FillEmpty),
        Err(SheetMapError::MissingRequiredField { .. })
    ));
}

#[test]
fn test_header_only_source() {
    let engine = EngineBuilder::new().with_first_data_row(2).build().unwrap();
    let template = engine
        .read_template(Cursor::new(fixtures::generate_compact_template().unwrap()))
        .unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_header_only_source().unwrap()))
        .unwrap();
    assert_eq!(source.row_count(), 0);

    let mut session = engine.session(template, source);
    let preview = session.preview();
    assert_eq!(preview.total_count, 0);
    assert!(preview.rows.is_empty());
    assert_eq!(preview.headers, vec!["Título", "Precio", "Stock"]);

    let outcome = session.write(WriteMode::FillEmpty).unwrap();
    assert_eq!(outcome.artifact.products_processed, 0);
    assert_eq!(outcome.report.summary.fields_filled, 0);
    assert!(!outcome.artifact.content.is_empty());
}

#[test]
fn test_first_data_row_two() {
    let engine = EngineBuilder::new().with_first_data_row(2).build().unwrap();
    let template = engine
        .read_template(Cursor::new(fixtures::generate_compact_template().unwrap()))
        .unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_offset_source().unwrap()))
        .unwrap();

    let mut session = engine.session(template, source);
    session.set_cell_edit(2, LogicalField::Stock, "4").unwrap();
    assert!(matches!(
        session.set_cell_edit(1, LogicalField::Stock, "4"),
        Err(SheetMapError::RowOutOfRange { row: 1, min: 2, .. })
    ));

    let outcome = session.write(WriteMode::FillEmpty).unwrap();
    assert_eq!(outcome.document.get(1, 0), Some(&CellValue::Text("Zapato".to_string())));
    assert_eq!(outcome.document.get(1, 1), Some(&CellValue::Number(99.5)));
    assert_eq!(outcome.document.get(1, 2), Some(&CellValue::Text("4".to_string())));
    assert_eq!(outcome.document.get(2, 0), Some(&CellValue::Text("Bota".to_string())));
}

#[test]
fn test_source_with_offset_range() {
    let engine = EngineBuilder::new().build().unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_offset_source().unwrap()))
        .unwrap();

    assert_eq!(
        source.headers(),
        ["Nombre Producto", "Unnamed: 1", "PRECIO_FINAL", "Fecha alta", "Activo"]
    );
    // 空行は読み飛ばされる
    assert_eq!(source.row_count(), 2);
    assert_eq!(source.value(0, "Unnamed: 1"), Some("sin encabezado"));
    assert_eq!(source.value(0, "PRECIO_FINAL"), Some("99.5"));
    assert_eq!(source.value(0, "Fecha alta"), Some("2024-01-15"));
    assert_eq!(source.value(0, "Activo"), Some("TRUE"));
    assert_eq!(source.value(1, "Nombre Producto"), Some("Bota"));
}

#[test]
fn test_template_with_offset_header() {
    let engine = EngineBuilder::new().build().unwrap();
    let template = engine
        .read_template(Cursor::new(fixtures::generate_offset_template().unwrap()))
        .unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_offset_source().unwrap()))
        .unwrap();

    let catalog = engine.catalog(&template);
    assert_eq!(catalog.fields.len(), 2);
    assert_eq!(catalog.fields[0].position, 2);

    let mut session = engine.session(template, source);
    assert_eq!(session.mapping().column(LogicalField::Price), Some("PRECIO_FINAL"));

    let outcome = session.write(WriteMode::FillEmpty).unwrap();
    assert_eq!(outcome.document.get(7, 2), Some(&CellValue::Text("Zapato".to_string())));
    assert_eq!(outcome.document.get(7, 3), Some(&CellValue::Number(99.5)));
    assert!(outcome.document.is_cell_empty(7, 0));
}

#[test]
fn test_interactive_edit_beyond_source_rows() {
    let engine = EngineBuilder::new().build().unwrap();
    let template = engine
        .read_template(Cursor::new(fixtures::generate_offset_template().unwrap()))
        .unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_offset_source().unwrap()))
        .unwrap();

    let mut session = engine.session(template, source);
    session.set_cell_edit(20, LogicalField::Price, "300").unwrap();

    let outcome = session.write(WriteMode::Interactive).unwrap();
    assert_eq!(outcome.report.rows.len(), 1);

    let row = outcome.report.row(20).unwrap();
    assert_eq!(row.filled.len(), 1);
    assert_eq!(row.filled[0].cell, "D20");
    assert!(row
        .skipped
        .iter()
        .any(|s| s.label == "Título" && s.reason == SkipReason::NoValue));
    assert_eq!(outcome.document.get(19, 3), Some(&CellValue::Number(300.0)));
}

#[test]
fn test_interactive_without_edits_is_rejected() {
    let engine = EngineBuilder::new().build().unwrap();
    let template = engine
        .read_template(Cursor::new(fixtures::generate_offset_template().unwrap()))
        .unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_offset_source().unwrap()))
        .unwrap();

    let mut session = engine.session(template, source);
    assert!(matches!(
        session.write(WriteMode::Interactive),
        Err(SheetMapError::EditsRequired)
    ));
}

#[test]
fn test_invalid_price_is_skipped() {
    let engine = EngineBuilder::new().with_first_data_row(2).build().unwrap();
    let template = engine
        .read_template(Cursor::new(fixtures::generate_compact_template().unwrap()))
        .unwrap();
    let source = engine
        .read_source(Cursor::new(fixtures::generate_offset_source().unwrap()))
        .unwrap();

    let mut session = engine.session(template, source);
    session.set_cell_edit(2, LogicalField::Price, "consultar").unwrap();

    let outcome = session.write(WriteMode::FillEmpty).unwrap();
    let row = outcome.report.row(2).unwrap();
    assert!(row.skipped.iter().any(|s| s.reason
        == SkipReason::InvalidPrice {
            value: "consultar".to_string()
        }));
    assert!(outcome.document.is_cell_empty(1, 1));
    // 他のフィールドは書き込まれる
    assert_eq!(outcome.document.get(1, 0), Some(&CellValue::Text("Zapato".to_string())));
}

#[test]
fn test_corrupted_file() {
    let engine = EngineBuilder::new().build().unwrap();
    let result = engine.read_template(Cursor::new(fixtures::generate_corrupted_file()));
    assert!(matches!(result, Err(SheetMapError::Parse(_))));

    let result = engine.read_source(Cursor::new(fixtures::generate_corrupted_file()));
    assert!(result.is_err());
}

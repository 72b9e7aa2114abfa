//! Security Tests
//!
//! セキュリティ対策のテストケースを実装します。
//! 巨大な入力、過大な行数・編集バッチ、パストラバーサルを含むファイル名、
//! 数式として解釈され得る値への対策を検証します。

use rust_xlsxwriter::*;
use sheetmap::{
    Artifact, ArtifactSink, CellValue, DirectorySink, EngineBuilder, SecurityConfig,
    SheetMapError, SourceTable, TemplateGrid, WriteMode, WriteRequest,
};
use std::io::Cursor;

mod fixtures {
    use super::*;

    /// ヘッダーと`rows`行のデータを持つ商品シート
    pub fn generate_products(rows: u32) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Título")?;
        worksheet.write_string(0, 1, "Precio")?;
        for row in 1..=rows {
            worksheet.write_string(row, 0, format!("Producto {}", row))?;
            worksheet.write_number(row, 1, f64::from(row) * 10.0)?;
        }
        Ok(workbook.save_to_buffer()?)
    }
}

fn limited(security: SecurityConfig) -> sheetmap::Engine {
    EngineBuilder::new()
        .with_first_data_row(2)
        .with_security(security)
        .build()
        .unwrap()
}

/// 入力サイズの上限を超えるワークブックは解析前に拒否される
#[test]
fn test_input_file_size_limit() {
    let data = fixtures::generate_products(3).unwrap();
    let engine = limited(SecurityConfig {
        max_input_file_size: data.len() as u64 - 1,
        ..SecurityConfig::default()
    });

    match engine.read_source(Cursor::new(data.clone())) {
        Err(SheetMapError::SecurityViolation(msg)) => {
            assert!(msg.contains("exceeds maximum"));
        }
        e => panic!("Unexpected result: {:?}", e),
    }
    assert!(matches!(
        engine.read_template(Cursor::new(data)),
        Err(SheetMapError::SecurityViolation(_))
    ));
}

/// 上限ちょうどのサイズは受け入れられる
#[test]
fn test_input_file_size_at_limit() {
    let data = fixtures::generate_products(3).unwrap();
    let engine = limited(SecurityConfig {
        max_input_file_size: data.len() as u64,
        ..SecurityConfig::default()
    });

    let source = engine.read_source(Cursor::new(data)).unwrap();
    assert_eq!(source.row_count(), 3);
}

/// ソースの行数の上限
#[test]
fn test_source_row_limit() {
    let engine = limited(SecurityConfig {
        max_source_rows: 3,
        ..SecurityConfig::default()
    });

    assert!(engine
        .read_source(Cursor::new(fixtures::generate_products(3).unwrap()))
        .is_ok());
    match engine.read_source(Cursor::new(fixtures::generate_products(4).unwrap())) {
        Err(SheetMapError::SecurityViolation(msg)) => {
            assert!(msg.contains("row count"));
        }
        e => panic!("Unexpected result: {:?}", e),
    }
}

/// 書き込み要求でも、読み込み済みのソースの行数が検証される
#[test]
fn test_handle_write_checks_source_rows() {
    let engine = limited(SecurityConfig {
        max_source_rows: 1,
        ..SecurityConfig::default()
    });
    let template = TemplateGrid::from_text_rows("Plantilla", &[vec!["Título", "Precio"]]);
    let source = SourceTable::new(
        vec!["Título".into(), "Precio".into()],
        vec![
            vec!["Zapato".into(), "100".into()],
            vec!["Bota".into(), "200".into()],
        ],
    );
    let request: WriteRequest = serde_json::from_str(
        r#"{"ml_template": "t.xlsx", "product_data": "p.xlsx", "mapping": {"title": "Título", "price": "Precio"}}"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let result = engine.handle_write(&request, &template, &source, &DirectorySink::new(dir.path()));
    assert!(matches!(result, Err(SheetMapError::SecurityViolation(_))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// 編集バッチの件数の上限（バッチ全体が拒否される）
#[test]
fn test_edit_batch_limit() {
    let engine = limited(SecurityConfig {
        max_edits_per_batch: 2,
        ..SecurityConfig::default()
    });
    let template = TemplateGrid::from_text_rows("Plantilla", &[vec!["Título", "Precio"]]);
    let source = engine
        .read_source(Cursor::new(fixtures::generate_products(3).unwrap()))
        .unwrap();
    let mut session = engine.session(template, source);

    let result = session.apply_edits_json(
        r#"[
            {"row": 2, "field": "price", "value": "1"},
            {"row": 3, "field": "price", "value": "2"},
            {"row": 4, "field": "price", "value": "3"}
        ]"#,
    );
    assert!(matches!(result, Err(SheetMapError::SecurityViolation(_))));
    assert!(session.edits().is_empty());

    let applied = session
        .apply_edits_json(
            r#"[{"row": 2, "field": "price", "value": "1"}, {"row": 3, "field": "price", "value": "2"}]"#,
        )
        .unwrap();
    assert_eq!(applied, 2);
}

/// パストラバーサルを含む成果物の接頭辞はビルド時に拒否される
#[test]
fn test_path_traversal_in_artifact_prefix() {
    for prefix in ["../salida", "/tmp/salida", "C:salida", "lotes\\salida", "lotes/salida", ""] {
        let result = EngineBuilder::new().with_artifact_prefix(prefix).build();
        assert!(
            matches!(result, Err(SheetMapError::Config(_))),
            "prefix {:?} should be rejected",
            prefix
        );
    }
}

/// 保存先は危険なファイル名の成果物を書き込まない
#[test]
fn test_sink_rejects_traversal_filename() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("descargas");
    std::fs::create_dir(&dir).unwrap();
    let sink = DirectorySink::new(&dir);

    let artifact = Artifact {
        filename: "../escape.xlsx".to_string(),
        digest: String::new(),
        content: b"PK".to_vec(),
        products_processed: 0,
    };

    assert!(matches!(
        sink.store(&artifact),
        Err(SheetMapError::SecurityViolation(_))
    ));
    assert!(!root.path().join("escape.xlsx").exists());
}

/// 数式のような値は文字列として書き込まれ、数式として評価されない
#[test]
fn test_formula_like_values_are_written_as_text() {
    let engine = limited(SecurityConfig::default());
    let template = TemplateGrid::from_text_rows("Plantilla", &[vec!["Título", "Precio"]]);
    let source = SourceTable::new(
        vec!["Título".into(), "Precio".into()],
        vec![vec!["=HYPERLINK(\"http://example.com\")".into(), "100".into()]],
    );

    let mut session = engine.session(template, source);
    let outcome = session.write(WriteMode::FillEmpty).unwrap();

    let reread = engine
        .read_template(Cursor::new(outcome.artifact.content))
        .unwrap();
    assert_eq!(
        reread.get(1, 0),
        Some(&CellValue::Text("=HYPERLINK(\"http://example.com\")".to_string()))
    );
}

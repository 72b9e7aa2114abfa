//! sheetmap - Field-mapping and template-fill engine for marketplace bulk-upload spreadsheets
//!
//! 出品者が用意した任意の商品スプレッドシートを、マーケットプレイスの一括登録テンプレートに
//! 変換するためのクレートです。ソース列とテンプレートのフィールドを固定の論理フィールド
//! （`title`, `price`, `stock`, ...）に分類して対応付け、書き込みモードに従って
//! テンプレートに値を書き込みます。
//!
//! # 処理の流れ
//!
//! 1. ヘッダーの正規化（[`normalize`]）
//! 2. 論理フィールドへの分類（[`classify`], [`RuleTable`]）
//! 3. 自動マッピング（[`AutoMapper`]）
//! 4. 未分類ヘッダーの手動割り当て（[`RemapResolver`]）
//! 5. セル単位の編集（[`EditStage`]）
//! 6. プレビュー（[`PreviewGenerator`]）と書き込み（[`TemplateWriter`]）
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use sheetmap::{DefaultSettings, EngineBuilder, WriteMode};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // デフォルト設定でエンジンを構築（データは8行目から）
//!     let engine = EngineBuilder::new().build()?;
//!
//!     let template = engine.read_template(File::open("plantilla.xlsx")?)?;
//!     let source = engine.read_source(File::open("productos.xlsx")?)?;
//!
//!     // 自動マッピング
//!     let mut session = engine.session(template, source);
//!     println!("unresolved: {:?}", session.unresolved_headers());
//!
//!     // プレビュー
//!     session.set_defaults(DefaultSettings {
//!         condition: Some("new".to_string()),
//!         ..Default::default()
//!     });
//!     session.render_preview(&mut std::io::stdout())?;
//!
//!     // 書き込み
//!     let outcome = session.write(WriteMode::FillEmpty)?;
//!     std::fs::write(&outcome.artifact.filename, &outcome.artifact.content)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Classification
//!
//! ```rust
//! use sheetmap::{classify, normalize, LogicalField};
//!
//! assert_eq!(classify(&normalize("Nombre Producto")), Some(LogicalField::Title));
//! assert_eq!(classify(&normalize("PRECIO_FINAL")), Some(LogicalField::Price));
//! assert_eq!(classify(&normalize("Notas internas")), None);
//! ```
//!
//! # Write Request
//!
//! ```rust,no_run
//! use std::fs::File;
//! use sheetmap::{DirectorySink, EngineBuilder, WriteRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineBuilder::new().build()?;
//! let request: WriteRequest = serde_json::from_str(r#"{
//!     "ml_template": "plantilla.xlsx",
//!     "product_data": "productos.xlsx",
//!     "mapping": {"Título": "Nombre Producto", "Precio": "Precio"},
//!     "write_mode": "fill-empty"
//! }"#)?;
//!
//! let template = engine.read_template(File::open(&request.ml_template)?)?;
//! let source = engine.read_source(File::open(&request.product_data)?)?;
//! let response = engine.handle_write(&request, &template, &source, &DirectorySink::new("out"))?;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! # Ok(())
//! # }
//! ```

mod api;
mod automap;
mod builder;
mod classify;
mod defaults;
mod edits;
mod error;
mod formatter;
mod grid;
mod mapping;
mod normalize;
mod output;
mod parser;
mod preview;
mod remap;
mod security;
mod session;
mod types;
mod wire;
mod writer;

// 公開API
pub use api::{ArtifactNaming, OutputFormat, SheetSelector, WriteMode};
pub use automap::{auto_map, AutoMapper, MappingAnalysis};
pub use builder::{Engine, EngineBuilder, DEFAULT_FIRST_DATA_ROW};
pub use classify::{classify, Classification, ClassificationRule, HeaderPartition, RuleTable};
pub use defaults::{CustomDefault, DefaultSettings};
pub use edits::{
    parse_edits_json, parse_edits_value, EditItem, EditPlacement, EditStage, QuarantinedEdit,
};
pub use error::SheetMapError;
pub use formatter::coerce_price;
pub use grid::{CellValue, TemplateColumns, TemplateGrid, MAX_ROWS};
pub use mapping::{FieldMapping, MappedColumn};
pub use normalize::{normalize, normalize_opt};
pub use preview::{Preview, PreviewCell, PreviewGenerator, PreviewRow, DEFAULT_PREVIEW_LIMIT};
pub use remap::{resolve, RemapChoices, RemapOutcome, RemapRequest, RemapResolver, RemapResponse};
pub use security::SecurityConfig;
pub use session::MappingSession;
pub use types::{
    Confidence, DetectedCategory, LogicalField, MappingEntry, MappingOrigin, NormalizedToken,
    PendingEdit, SourceTable, TemplateCatalog, TemplateField,
};
pub use wire::{ArtifactSink, DirectorySink, DownloadRef, FileInfo, WriteRequest, WriteResponse};
pub use writer::{
    Artifact, FillReport, FillSummary, FilledCell, RowReport, SkipReason, SkippedCell,
    TemplateWriter, WriteInput, WriteOutcome, DEFAULT_ARTIFACT_PREFIX, DEFAULT_REQUIRED_FIELDS,
};

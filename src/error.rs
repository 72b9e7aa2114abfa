//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。
//!
//! ヘッダーの分類失敗（どのルールにも一致しない）はエラーではなく、
//! `Option::None`として扱われ、`RemapResolver`に回される。

use thiserror::Error;

use crate::types::LogicalField;

/// sheetmapクレート全体で使用するエラー型
///
/// マッピング、編集、プレビュー、テンプレート書き込みの各段階で
/// 発生するすべてのエラーを統一的に扱うために使用されます。
///
/// 検証系のエラー（`AmbiguousRemap`、`MissingRequiredField`、
/// `MalformedEditsPayload`、`RowOutOfRange`）はすべて状態を変更する前に
/// 返されるため、エラー発生時に`FieldMapping`や`EditStage`が
/// 部分的に変更されることはありません。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetmap::SheetMapError;
/// use std::fs::File;
///
/// fn open_template(path: &str) -> Result<File, SheetMapError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(file)
/// }
/// ```
#[derive(Error, Debug)]
pub enum SheetMapError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Excelファイルの解析中に発生したエラー（calamine由来）
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// 出力ワークブックの生成中に発生したエラー（rust_xlsxwriter由来）
    #[error("Failed to write Excel file: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// JSONのシリアライズ・デシリアライズ中に発生したエラー
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定の検証に失敗したエラー
    ///
    /// `EngineBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。例えば、分類ルール表に他のルールを覆い隠す
    /// フレーズが含まれている場合や、データ開始行が2未満の場合などです。
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use sheetmap::{EngineBuilder, SheetMapError};
    ///
    /// let result = EngineBuilder::new()
    ///     .with_first_data_row(1)  // ヘッダー行が存在しない
    ///     .build();
    ///
    /// match result {
    ///     Err(SheetMapError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// 再マッピングの選択がすべて空だったエラー
    ///
    /// 「何も確定しない」という適用は存在しないため、ローカルで拒否されます。
    /// リゾルバーは開いたままになり、マッピングは変更されません。
    #[error("Remap rejected: at least one header must be assigned to a logical field")]
    AmbiguousRemap,

    /// 必須の論理フィールドがマッピングされていないエラー
    ///
    /// 書き込み前に検証され、成果物には一切触れません。
    #[error("Missing required field(s): {}", join_fields(.fields))]
    MissingRequiredField {
        /// マッピングが解決できなかった論理フィールド
        fields: Vec<LogicalField>,
    },

    /// 編集ペイロードが不正なエラー
    ///
    /// JSONとして不正な場合や、分類できないフィールドを参照している場合に発生します。
    /// バッチ全体が拒否され、部分的な適用は行われません。
    #[error("Malformed edits payload: {0}")]
    MalformedEditsPayload(String),

    /// 編集がデータ開始行より上、またはワークシートの最終行より下の行を参照しているエラー
    #[error("Row {row} is out of range: edits must target rows {min} through {max}")]
    RowOutOfRange {
        /// 指定された行（1始まり）
        row: i64,
        /// 最初のデータ行（1始まり）
        min: u32,
        /// ワークシートの最終行（1始まり）
        max: u32,
    },

    /// interactiveモードで編集が指定されていないエラー
    #[error("Interactive write mode requires at least one edit")]
    EditsRequired,

    /// マッピングがソーススキーマに存在しない列を参照しているエラー
    #[error("Source column '{0}' does not exist in the current source schema")]
    UnknownSourceColumn(String),

    /// マッピングのキーが論理フィールドにもテンプレートラベルにも解決できないエラー
    #[error("Mapping target '{0}' is neither a logical field nor a recognizable template label")]
    UnknownMappingTarget(String),

    /// 外部コラボレーター（成果物の保存先など）の失敗
    ///
    /// ローカルでの再試行は行わず、そのまま呼び出し元に伝播します。
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// 入力ファイルサイズ、行数、編集バッチサイズの上限や、
    /// 安全でない成果物ファイル名が検出された場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

fn join_fields(fields: &[LogicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

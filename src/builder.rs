//! Builder Module
//!
//! Fluent Builder APIを提供し、`Engine`インスタンスを段階的に構築する。

use std::io::{Read, Write};

use crate::api::{ArtifactNaming, OutputFormat, SheetSelector};
use crate::automap::AutoMapper;
use crate::classify::RuleTable;
use crate::edits::{parse_edits_value, EditStage};
use crate::error::SheetMapError;
use crate::grid::TemplateGrid;
use crate::mapping::FieldMapping;
use crate::output::OutputFormatter;
use crate::parser::WorkbookReader;
use crate::preview::{Preview, PreviewGenerator, DEFAULT_PREVIEW_LIMIT};
use crate::security::{validate_artifact_name, SecurityConfig};
use crate::session::MappingSession;
use crate::types::{LogicalField, SourceTable, TemplateCatalog};
use crate::wire::{ArtifactSink, FileInfo, WriteRequest, WriteResponse};
use crate::writer::{
    TemplateWriter, WriteInput, WriteOutcome, DEFAULT_ARTIFACT_PREFIX, DEFAULT_REQUIRED_FIELDS,
};

/// テンプレートの最初のデータ行（デフォルト）
pub const DEFAULT_FIRST_DATA_ROW: u32 = 8;

/// エンジンの設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    /// 最初のデータ行（1始まり）
    pub first_data_row: u32,

    /// プレビューの行数
    pub preview_limit: usize,

    /// 書き込みに必須の論理フィールド
    pub required_fields: Vec<LogicalField>,

    /// 既定のルール表に追加する分類ルール
    pub extra_rules: Vec<(LogicalField, Vec<String>)>,

    /// 成果物の命名方式
    pub artifact_naming: ArtifactNaming,

    /// 成果物ファイル名の接頭辞
    pub artifact_prefix: String,

    /// プレビューの出力フォーマット
    pub output_format: OutputFormat,

    /// テンプレート文書のシート
    pub template_sheet: SheetSelector,

    /// 商品データのシート
    pub source_sheet: SheetSelector,

    /// セキュリティ制限
    pub security: SecurityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            first_data_row: DEFAULT_FIRST_DATA_ROW,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            required_fields: DEFAULT_REQUIRED_FIELDS.to_vec(),
            extra_rules: Vec::new(),
            artifact_naming: ArtifactNaming::ContentAddressed,
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            output_format: OutputFormat::Markdown,
            template_sheet: SheetSelector::default(),
            source_sheet: SheetSelector::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Engine`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust
/// use sheetmap::{ArtifactNaming, EngineBuilder, LogicalField};
///
/// # fn main() -> Result<(), sheetmap::SheetMapError> {
/// let engine = EngineBuilder::new()
///     .with_first_data_row(8)
///     .with_preview_limit(10)
///     .with_extra_rule(LogicalField::Sku, &["gtin", "ean"])
///     .with_artifact_naming(ArtifactNaming::Timestamped)
///     .build()?;
///
/// assert_eq!(engine.classify_header("EAN"), Some(LogicalField::Sku));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EngineBuilder {
    /// 内部設定（構築中）
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 最初のデータ行: 8（ヘッダー行は7行目）
    /// - プレビュー行数: 5
    /// - 必須フィールド: `title`, `price`
    /// - 成果物の命名: コンテンツアドレス（接頭辞 `ml_productos_mapeados`）
    /// - プレビューの出力フォーマット: Markdown
    /// - シート: テンプレート・商品データとも最初のシート
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// 最初のデータ行を設定する（1始まり、2以上）
    ///
    /// ヘッダー行はその1行上になります。編集はこの行以降のみ受け付けます。
    pub fn with_first_data_row(mut self, row: u32) -> Self {
        self.config.first_data_row = row;
        self
    }

    /// プレビューの行数を設定する（1以上）
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.config.preview_limit = limit;
        self
    }

    /// 書き込みに必須の論理フィールドを設定する
    pub fn with_required_fields(mut self, fields: &[LogicalField]) -> Self {
        self.config.required_fields = fields.to_vec();
        self
    }

    /// 分類ルールを追加する
    ///
    /// 追加したルールは既定のルールの後に評価されます。フレーズは正規化済みの形
    /// （小文字、アクセントなし）で指定してください。ルール表全体は`build()`時に検証されます。
    ///
    /// # 引数
    ///
    /// * `field` - 分類先の論理フィールド
    /// * `phrases` - 単語単位で一致させるフレーズ
    pub fn with_extra_rule<S: AsRef<str>>(mut self, field: LogicalField, phrases: &[S]) -> Self {
        self.config.extra_rules.push((
            field,
            phrases.iter().map(|p| p.as_ref().to_string()).collect(),
        ));
        self
    }

    /// 成果物の命名方式を設定する
    pub fn with_artifact_naming(mut self, naming: ArtifactNaming) -> Self {
        self.config.artifact_naming = naming;
        self
    }

    /// 成果物ファイル名の接頭辞を設定する
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.artifact_prefix = prefix.into();
        self
    }

    /// プレビューの出力フォーマットを設定する
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// テンプレート文書として読み込むシートを選択する
    pub fn with_template_sheet(mut self, selector: SheetSelector) -> Self {
        self.config.template_sheet = selector;
        self
    }

    /// 商品データとして読み込むシートを選択する
    pub fn with_source_sheet(mut self, selector: SheetSelector) -> Self {
        self.config.source_sheet = selector;
        self
    }

    /// セキュリティ制限を設定する
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// 設定を検証して`Engine`を構築する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Engine)`: 設定が有効な場合
    /// * `Err(SheetMapError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * `SheetMapError::Config(String)`: 設定の検証に失敗した場合
    ///   * 最初のデータ行が2未満（ヘッダー行が存在しない）
    ///   * プレビュー行数が0
    ///   * 追加ルールが既存のルールに覆い隠される、または正規化されていない
    ///   * 成果物ファイル名の接頭辞が安全なファイル名でない
    pub fn build(self) -> Result<Engine, SheetMapError> {
        // 1. 行位置の検証
        if self.config.first_data_row < 2 {
            return Err(SheetMapError::Config(format!(
                "Invalid first data row: {} (must be 2 or greater so that a header row exists)",
                self.config.first_data_row
            )));
        }

        // 2. プレビュー行数の検証
        if self.config.preview_limit == 0 {
            return Err(SheetMapError::Config(
                "Invalid preview limit: must be at least 1".to_string(),
            ));
        }

        // 3. 成果物ファイル名の接頭辞の検証
        validate_artifact_name(&self.config.artifact_prefix)
            .map_err(|e| SheetMapError::Config(format!("Invalid artifact prefix: {}", e)))?;

        // 4. ルール表の構築と検証
        let table = if self.config.extra_rules.is_empty() {
            RuleTable::default()
        } else {
            RuleTable::with_extra_rules(&self.config.extra_rules)?
        };

        Ok(Engine::new(self.config, table))
    }
}

/// マッピングと書き込みのファサード
///
/// `EngineBuilder`を使用して構築された設定に基づいて、ワークブックの読み込み、
/// 自動マッピング、プレビュー、テンプレートへの書き込みを実行します。
/// 状態を持たないため、複数のセッションや書き込み要求で共有できます。
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    table: RuleTable,
}

impl Engine {
    pub(crate) fn new(config: EngineConfig, table: RuleTable) -> Self {
        Self { config, table }
    }

    pub fn rule_table(&self) -> &RuleTable {
        &self.table
    }

    pub fn first_data_row(&self) -> u32 {
        self.config.first_data_row
    }

    pub fn preview_limit(&self) -> usize {
        self.config.preview_limit
    }

    pub fn required_fields(&self) -> &[LogicalField] {
        &self.config.required_fields
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.config.security
    }

    /// ヘッダー行（0始まり）
    pub(crate) fn header_row(&self) -> u32 {
        self.config.first_data_row - 2
    }

    /// 生のヘッダーを論理フィールドに分類する
    pub fn classify_header(&self, raw: &str) -> Option<LogicalField> {
        self.table.classify_header(raw)
    }

    pub fn auto_mapper(&self) -> AutoMapper<'_> {
        AutoMapper::new(&self.table)
    }

    pub fn preview_generator(&self) -> PreviewGenerator<'_> {
        PreviewGenerator::new(&self.table, self.config.first_data_row)
    }

    pub fn template_writer(&self) -> TemplateWriter<'_> {
        TemplateWriter::new(&self.table, self.config.first_data_row)
            .with_required_fields(&self.config.required_fields)
            .with_naming(self.config.artifact_naming, self.config.artifact_prefix.clone())
    }

    /// 空の編集ステージ
    pub fn edit_stage(&self) -> EditStage {
        EditStage::new(self.config.first_data_row)
            .with_max_batch(self.config.security.max_edits_per_batch)
    }

    /// テンプレート文書のヘッダー行からフィールドカタログを生成する
    ///
    /// 想定のヘッダー行に論理フィールドがない場合は、検出したヘッダー行を使用します。
    pub fn catalog(&self, template: &TemplateGrid) -> TemplateCatalog {
        template.catalog(template.locate_header_row(self.header_row(), &self.table))
    }

    /// ワークブックからテンプレート文書を読み込む
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use sheetmap::EngineBuilder;
    /// use std::fs::File;
    ///
    /// # fn main() -> Result<(), sheetmap::SheetMapError> {
    /// let engine = EngineBuilder::new().build()?;
    /// let template = engine.read_template(File::open("plantilla.xlsx")?)?;
    /// let source = engine.read_source(File::open("productos.xlsx")?)?;
    /// let session = engine.session(template, source);
    /// println!("{:?}", session.unresolved_headers());
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_template<R: Read>(&self, input: R) -> Result<TemplateGrid, SheetMapError> {
        let mut reader = WorkbookReader::open(input, &self.config.security)?;
        reader.read_grid(&self.config.template_sheet)
    }

    /// ワークブックから商品データを読み込む（最初の行がヘッダー）
    pub fn read_source<R: Read>(&self, input: R) -> Result<SourceTable, SheetMapError> {
        let mut reader = WorkbookReader::open(input, &self.config.security)?;
        reader.read_table(&self.config.source_sheet, &self.config.security)
    }

    /// マッピングセッションを開始する
    ///
    /// テンプレートのヘッダー行と商品データのヘッダーから自動マッピングを行います。
    pub fn session(&self, template: TemplateGrid, source: SourceTable) -> MappingSession<'_> {
        MappingSession::new(self, template, source)
    }

    /// プレビューを設定された出力フォーマットで出力する
    pub fn render_preview<W: Write>(
        &self,
        preview: &Preview,
        writer: &mut W,
    ) -> Result<(), SheetMapError> {
        OutputFormatter::from_format(self.config.output_format).render(preview, writer)
    }

    /// プレビューを設定された出力フォーマットの文字列にする
    pub fn render_preview_to_string(&self, preview: &Preview) -> Result<String, SheetMapError> {
        let mut buffer = Vec::new();
        self.render_preview(preview, &mut buffer)?;

        let result = String::from_utf8(buffer).map_err(|e| {
            SheetMapError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        Ok(result)
    }

    /// 書き込み要求を処理する
    ///
    /// ワイヤー形式のマッピング・既定値・編集を内部表現に変換してローカルで検証し、
    /// テンプレートに書き込んで成果物を保存先に格納します。
    /// 検証に失敗した場合は成果物を生成せず、保存先にも触れません。
    ///
    /// # 引数
    ///
    /// * `request` - 書き込み要求
    /// * `template` - `request.ml_template`が参照するテンプレート文書
    /// * `source` - `request.product_data`が参照する商品データ
    /// * `sink` - 成果物の保存先
    ///
    /// # 戻り値
    ///
    /// * `Ok(WriteResponse)` - 書き込みと保存に成功した場合
    /// * `Err(SheetMapError::UnknownMappingTarget)` - マッピングのキーが解決できない場合
    /// * `Err(SheetMapError::MalformedEditsPayload)` / `Err(SheetMapError::RowOutOfRange)` - 編集が不正な場合
    /// * `Err(SheetMapError::MissingRequiredField)` - 必須フィールドがマッピングされていない場合
    /// * `Err(SheetMapError::Upstream)` - 保存先が失敗した場合
    pub fn handle_write(
        &self,
        request: &WriteRequest,
        template: &TemplateGrid,
        source: &SourceTable,
        sink: &dyn ArtifactSink,
    ) -> Result<WriteResponse, SheetMapError> {
        self.config.security.check_source_rows(source.row_count())?;

        let mapping = FieldMapping::from_wire(&request.mapping, &self.table)?;

        let mut edits = self.edit_stage();
        if let Some(payload) = &request.edits {
            let items = parse_edits_value(payload)?;
            edits.apply_batch(&items, &mapping, &self.table)?;
        }

        let outcome = self.write(&WriteInput {
            template,
            mapping: &mapping,
            source,
            edits: &edits,
            defaults: &request.default_settings,
            mode: request.write_mode,
        })?;

        let download = sink.store(&outcome.artifact)?;

        Ok(WriteResponse {
            file_info: FileInfo {
                products_processed: outcome.artifact.products_processed,
                filename: outcome.artifact.filename.clone(),
                mapping_fields: mapping.len(),
                write_mode: request.write_mode,
            },
            download,
            summary: outcome.report.summary,
        })
    }

    /// テンプレートに書き込む
    pub fn write(&self, input: &WriteInput<'_>) -> Result<WriteOutcome, SheetMapError> {
        self.template_writer().write(input)
    }
}

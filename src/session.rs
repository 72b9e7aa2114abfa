//! Mapping Session Module
//!
//! 1人のユーザーの編集セッションが保持する状態（マッピング、編集ステージ、
//! 再マッピングのリゾルバー）を明示的なコンテキストとして扱うモジュール。
//!
//! セッションの状態を変更する操作はすべて`&mut self`を取り、プレビューは`&self`を取ります。
//! そのため、プレビューや書き込みの実行中にマッピングや編集が変更されることはありません。

use std::io::Write;

use crate::api::WriteMode;
use crate::automap::MappingAnalysis;
use crate::builder::Engine;
use crate::defaults::DefaultSettings;
use crate::edits::{parse_edits_json, EditItem, EditPlacement, EditStage};
use crate::error::SheetMapError;
use crate::grid::TemplateGrid;
use crate::mapping::FieldMapping;
use crate::preview::Preview;
use crate::remap::{RemapChoices, RemapOutcome, RemapResolver};
use crate::types::{LogicalField, MappingOrigin, SourceTable, TemplateCatalog};
use crate::writer::{WriteInput, WriteOutcome};

/// マッピングセッション
///
/// # 使用例
///
/// ```rust
/// use sheetmap::{EngineBuilder, LogicalField, RemapChoices, SourceTable, TemplateGrid, WriteMode};
///
/// # fn main() -> Result<(), sheetmap::SheetMapError> {
/// let engine = EngineBuilder::new().with_first_data_row(2).build()?;
/// let template = TemplateGrid::from_text_rows("Plantilla", &[vec!["Título", "Precio", "SKU"]]);
/// let source = SourceTable::new(
///     vec!["Nombre Producto".into(), "Precio".into(), "Notas internas".into()],
///     vec![vec!["Zapato".into(), "100".into(), "Z-1".into()]],
/// );
///
/// let mut session = engine.session(template, source);
/// assert_eq!(session.unresolved_headers(), ["Notas internas".to_string()]);
///
/// let mut choices = RemapChoices::new();
/// choices.insert("Notas internas".to_string(), Some(LogicalField::Sku));
/// session.apply_remap(&choices)?;
/// assert_eq!(session.mapping().column(LogicalField::Sku), Some("Notas internas"));
///
/// session.set_cell_edit(2, LogicalField::Price, "150")?;
/// assert_eq!(session.preview().rows[0].get("Precio"), Some("150"));
///
/// let outcome = session.write(WriteMode::FillEmpty)?;
/// assert_eq!(outcome.artifact.products_processed, 1);
/// assert!(session.edits().is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MappingSession<'e> {
    engine: &'e Engine,
    template: TemplateGrid,
    source: SourceTable,
    catalog: TemplateCatalog,
    defaults: DefaultSettings,
    analysis: MappingAnalysis,
    mapping: FieldMapping,
    edits: EditStage,
    resolver: RemapResolver,
}

impl<'e> MappingSession<'e> {
    pub(crate) fn new(engine: &'e Engine, template: TemplateGrid, source: SourceTable) -> Self {
        let catalog = engine.catalog(&template);
        let mut session = Self {
            engine,
            template,
            source,
            catalog,
            defaults: DefaultSettings::default(),
            analysis: MappingAnalysis::default(),
            mapping: FieldMapping::new(),
            edits: engine.edit_stage(),
            resolver: RemapResolver::default(),
        };
        session.analyze();
        session
    }

    /// 自動マッピングを実行し、マッピングとリゾルバーを初期状態にする
    fn analyze(&mut self) {
        self.analysis = self
            .engine
            .auto_mapper()
            .analyze(&self.catalog.fields, self.source.headers());
        self.mapping = FieldMapping::from_entries(&self.analysis.entries);
        self.resolver = RemapResolver::new(&self.analysis.unresolved_headers);

        tracing::debug!(
            mapped = self.mapping.len(),
            unresolved = self.analysis.unresolved_headers.len(),
            unmapped_template_fields = self.analysis.unmapped_template_fields.len(),
            "analyzed mapping session"
        );
    }

    pub fn template(&self) -> &TemplateGrid {
        &self.template
    }

    pub fn source(&self) -> &SourceTable {
        &self.source
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// 自動マッピングの結果
    pub fn analysis(&self) -> &MappingAnalysis {
        &self.analysis
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn edits(&self) -> &EditStage {
        &self.edits
    }

    pub fn defaults(&self) -> &DefaultSettings {
        &self.defaults
    }

    pub fn remap_resolver(&self) -> &RemapResolver {
        &self.resolver
    }

    /// ユーザーの割り当てを待っている未分類ヘッダー
    ///
    /// 再マッピングを適用した後は空になります。
    pub fn unresolved_headers(&self) -> &[String] {
        if self.resolver.is_open() {
            self.resolver.unknown_headers()
        } else {
            &[]
        }
    }

    /// ワイヤー形式のマッピング（テンプレートラベル → ソース列）
    pub fn wire_mapping(&self) -> std::collections::BTreeMap<String, String> {
        self.mapping.to_wire(&self.catalog, self.engine.rule_table())
    }

    pub fn set_defaults(&mut self, defaults: DefaultSettings) {
        self.defaults = defaults;
    }

    /// 論理フィールドにソース列を割り当てる（ユーザー確定）
    ///
    /// # 戻り値
    ///
    /// * `Err(SheetMapError::UnknownSourceColumn)` - ソースに存在しない列を指定した場合
    pub fn reassign(&mut self, field: LogicalField, column: &str) -> Result<(), SheetMapError> {
        if !self.source.has_column(column) {
            return Err(SheetMapError::UnknownSourceColumn(column.to_string()));
        }
        self.mapping
            .assign(field, column, MappingOrigin::UserConfirmed);
        Ok(())
    }

    pub fn unassign(&mut self, field: LogicalField) {
        self.mapping.unassign(field);
    }

    /// セルの編集を設定する（同じ行・フィールドの編集は置き換える）
    pub fn set_cell_edit(
        &mut self,
        row: u32,
        field: LogicalField,
        value: impl Into<String>,
    ) -> Result<Option<String>, SheetMapError> {
        self.edits.set(row, field, value)
    }

    /// 生のヘッダーを指定してセルの編集を設定する
    ///
    /// 分類できないヘッダーの編集は、再マッピングで解決されるまで隔離されます。
    pub fn set_cell_edit_by_header(
        &mut self,
        row: u32,
        header: &str,
        value: impl Into<String>,
    ) -> Result<EditPlacement, SheetMapError> {
        self.edits
            .set_by_header(row, header, value, self.engine.rule_table())
    }

    /// 編集バッチを適用する（all-or-nothing）
    pub fn apply_edits(&mut self, items: &[EditItem]) -> Result<usize, SheetMapError> {
        self.edits
            .apply_batch(items, &self.mapping, self.engine.rule_table())
    }

    /// JSON形式の編集バッチを適用する（all-or-nothing）
    pub fn apply_edits_json(&mut self, json: &str) -> Result<usize, SheetMapError> {
        let items = parse_edits_json(json)?;
        self.apply_edits(&items)
    }

    pub fn clear_edits(&mut self) {
        self.edits.clear();
    }

    /// 未分類ヘッダーへのユーザーの割り当てを適用する
    ///
    /// # 戻り値
    ///
    /// * `Err(SheetMapError::AmbiguousRemap)` - 1つも割り当てられていない場合。
    ///   マッピング・編集ともに変更されず、リゾルバーは開いたままです。
    pub fn apply_remap(&mut self, choices: &RemapChoices) -> Result<RemapOutcome, SheetMapError> {
        self.resolver
            .apply(choices, &mut self.mapping, &mut self.edits)
    }

    /// プレビューを生成する（状態は変更しない）
    pub fn preview(&self) -> Preview {
        self.engine.preview_generator().preview(
            &self.catalog,
            &self.mapping,
            &self.source,
            &self.edits,
            &self.defaults,
            self.engine.preview_limit(),
        )
    }

    /// プレビューを設定された出力フォーマットで出力する
    pub fn render_preview<W: Write>(&self, writer: &mut W) -> Result<(), SheetMapError> {
        self.engine.render_preview(&self.preview(), writer)
    }

    /// テンプレートに書き込む
    ///
    /// 成功した場合は編集ステージを空にします。失敗した場合はセッションの状態を変更しません。
    pub fn write(&mut self, mode: WriteMode) -> Result<WriteOutcome, SheetMapError> {
        let outcome = self.engine.write(&WriteInput {
            template: &self.template,
            mapping: &self.mapping,
            source: &self.source,
            edits: &self.edits,
            defaults: &self.defaults,
            mode,
        })?;
        self.edits.clear();
        Ok(outcome)
    }

    /// セッションを開始直後の状態に戻す
    ///
    /// 編集を破棄し、自動マッピングをやり直します。既定値の設定は保持します。
    pub fn reset(&mut self) {
        self.edits.clear();
        self.analyze();
    }
}

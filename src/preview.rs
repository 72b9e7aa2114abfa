//! Preview Generator Module
//!
//! マッピング結果の先頭N行を、書き込みを行わずに生成するモジュール。
//!
//! セルの値は次の優先順位で解決されます。
//! 1. その行・論理フィールドに対するステージ済みの編集
//! 2. 論理フィールドにマッピングされたソース列の値
//! 3. 既定値の設定
//! 4. 空文字列

use serde::{Deserialize, Serialize};

use crate::classify::RuleTable;
use crate::defaults::DefaultSettings;
use crate::edits::EditStage;
use crate::mapping::FieldMapping;
use crate::types::{LogicalField, SourceTable, TemplateCatalog};

/// デフォルトのプレビュー行数
pub const DEFAULT_PREVIEW_LIMIT: usize = 5;

/// プレビューのセル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCell {
    /// テンプレートのラベル
    pub label: String,
    pub value: String,
}

/// プレビューの1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    /// 行番号（1始まり、`fill-empty`・`overwrite`では書き込み先の行と同じ）
    pub row: u32,
    pub cells: Vec<PreviewCell>,
}

impl PreviewRow {
    /// ラベルに対応する値（同じラベルが複数ある場合は最初のもの）
    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.value.as_str())
    }

    /// 列順の値
    pub fn values(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.value.as_str()).collect()
    }
}

/// プレビュー結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    /// テンプレートのラベル（列順）
    pub headers: Vec<String>,
    /// ソースデータの総行数
    pub total_count: usize,
    /// プレビューに含めた行数
    pub preview_count: usize,
    pub rows: Vec<PreviewRow>,
}

/// 値の解決に必要な入力一式
///
/// プレビューとテンプレート書き込みで同じ優先順位を共有するために使用します。
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValueResolver<'a> {
    pub mapping: &'a FieldMapping,
    pub source: &'a SourceTable,
    pub edits: &'a EditStage,
    pub defaults: &'a DefaultSettings,
    pub table: &'a RuleTable,
}

impl<'a> ValueResolver<'a> {
    /// 論理フィールドの値を解決する
    ///
    /// # 引数
    ///
    /// * `source_row` - ソースの行インデックス（0始まり、対応するソース行がない場合は`None`）
    /// * `edit_row` - 編集の参照に使う行番号（1始まり、プレビューの行番号と同じ）
    pub fn resolve(
        &self,
        source_row: Option<usize>,
        edit_row: u32,
        field: LogicalField,
    ) -> Option<String> {
        if let Some(edit) = self.edits.get(edit_row, field) {
            return Some(edit.to_string());
        }

        let mapped = source_row.and_then(|i| {
            let column = self.mapping.column(field)?;
            self.source.value(i, column)
        });
        if let Some(value) = mapped.filter(|v| !v.trim().is_empty()) {
            return Some(value.to_string());
        }

        self.defaults.value_for_with(field, self.table)
    }

    /// テンプレートのラベルの値を解決する
    ///
    /// ラベルが論理フィールドに分類できない場合は、ラベル単位の既定値を使用します。
    pub fn resolve_label(&self, source_row: Option<usize>, edit_row: u32, label: &str) -> String {
        match self.table.classify_header(label) {
            Some(field) => self.resolve(source_row, edit_row, field),
            None => self.defaults.value_for_label(label).map(str::to_string),
        }
        .unwrap_or_default()
    }
}

/// プレビュー生成器
#[derive(Debug, Clone, Copy)]
pub struct PreviewGenerator<'a> {
    table: &'a RuleTable,
    first_data_row: u32,
}

impl<'a> PreviewGenerator<'a> {
    /// # 引数
    ///
    /// * `table` - 分類ルール表
    /// * `first_data_row` - 最初のデータ行（1始まり）
    pub fn new(table: &'a RuleTable, first_data_row: u32) -> Self {
        Self {
            table,
            first_data_row,
        }
    }

    /// プレビューを生成する
    ///
    /// 入力はいずれも変更しません。`catalog`が空の場合は、マッピング済みの
    /// 論理フィールドのキーを列として使用します。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use sheetmap::{
    ///     DefaultSettings, EditStage, FieldMapping, LogicalField, MappingOrigin,
    ///     PreviewGenerator, RuleTable, SourceTable, TemplateCatalog,
    /// };
    ///
    /// let mut mapping = FieldMapping::new();
    /// mapping.assign(LogicalField::Price, "Precio", MappingOrigin::UserConfirmed);
    /// let source = SourceTable::new(vec!["Precio".into()], vec![vec!["100".into()]]);
    /// let catalog = TemplateCatalog::from_labels(&["Precio"]);
    /// let mut edits = EditStage::new(8);
    ///
    /// let generator = PreviewGenerator::new(RuleTable::default_rules(), 8);
    /// let preview = generator.preview(
    ///     &catalog, &mapping, &source, &edits, &DefaultSettings::default(), 5,
    /// );
    /// assert_eq!(preview.rows[0].get("Precio"), Some("100"));
    ///
    /// edits.set(8, LogicalField::Price, "150").unwrap();
    /// let preview = generator.preview(
    ///     &catalog, &mapping, &source, &edits, &DefaultSettings::default(), 5,
    /// );
    /// assert_eq!(preview.rows[0].get("Precio"), Some("150"));
    /// ```
    pub fn preview(
        &self,
        catalog: &TemplateCatalog,
        mapping: &FieldMapping,
        source: &SourceTable,
        edits: &EditStage,
        defaults: &DefaultSettings,
        limit: usize,
    ) -> Preview {
        let resolver = ValueResolver {
            mapping,
            source,
            edits,
            defaults,
            table: self.table,
        };

        let mut template_fields: Vec<_> = catalog.fields.iter().collect();
        template_fields.sort_by_key(|f| f.position);
        let headers: Vec<String> = if template_fields.is_empty() {
            mapping.fields().iter().map(|f| f.as_str().to_string()).collect()
        } else {
            template_fields.iter().map(|f| f.field_name.clone()).collect()
        };

        let total_count = source.row_count();
        let preview_count = total_count.min(limit);

        let rows = (0..preview_count)
            .map(|i| {
                let dest_row = self.first_data_row + i as u32;
                PreviewRow {
                    row: dest_row,
                    cells: headers
                        .iter()
                        .map(|label| PreviewCell {
                            label: label.clone(),
                            value: resolver.resolve_label(Some(i), dest_row, label),
                        })
                        .collect(),
                }
            })
            .collect();

        tracing::debug!(total_count, preview_count, columns = headers.len(), "generated preview");

        Preview {
            headers,
            total_count,
            preview_count,
            rows,
        }
    }
}

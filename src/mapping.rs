//! Field Mapping Module
//!
//! 論理フィールドをキーとするマッピングと、テンプレートラベルをキーとする
//! ワイヤー形式との相互変換を行うモジュール。

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::RuleTable;
use crate::error::SheetMapError;
use crate::types::{LogicalField, MappingEntry, MappingOrigin, SourceTable, TemplateCatalog};

/// マッピング先のソース列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedColumn {
    /// ソース列名
    pub column: String,

    /// マッピングの由来
    pub origin: MappingOrigin,
}

/// 論理フィールド → ソース列のマッピング
///
/// キーは一意で、順序に意味はありません。空の列名は保持しません。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: BTreeMap<LogicalField, MappedColumn>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// マッピングエントリから構築する
    ///
    /// 同じ論理フィールドに複数のエントリがある場合は最初のエントリを採用します。
    pub fn from_entries(entries: &[MappingEntry]) -> Self {
        let mut mapping = Self::new();
        for entry in entries {
            if entry.source_column.is_empty() {
                continue;
            }
            mapping
                .entries
                .entry(entry.logical_field)
                .or_insert_with(|| MappedColumn {
                    column: entry.source_column.clone(),
                    origin: entry.origin,
                });
        }
        mapping
    }

    /// ワイヤー形式（テンプレートラベル → ソース列）から変換する
    ///
    /// キーは論理フィールドのキー（例: `"price"`）として解釈し、そうでなければ
    /// テンプレートラベルとして分類します。値が空のキーは無視します。
    ///
    /// # 戻り値
    ///
    /// * `Err(SheetMapError::UnknownMappingTarget)` - キーがどちらにも解決できない場合
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use sheetmap::{FieldMapping, LogicalField, RuleTable};
    ///
    /// let mut wire = BTreeMap::new();
    /// wire.insert("Título".to_string(), "Nombre Producto".to_string());
    /// wire.insert("price".to_string(), "Precio".to_string());
    ///
    /// let mapping = FieldMapping::from_wire(&wire, RuleTable::default_rules()).unwrap();
    /// assert_eq!(mapping.column(LogicalField::Title), Some("Nombre Producto"));
    /// assert_eq!(mapping.column(LogicalField::Price), Some("Precio"));
    /// ```
    pub fn from_wire(
        wire: &BTreeMap<String, String>,
        table: &RuleTable,
    ) -> Result<Self, SheetMapError> {
        let mut mapping = Self::new();
        for (key, column) in wire {
            if column.trim().is_empty() {
                continue;
            }
            let field = resolve_target(key, table)?;
            mapping.assign(field, column.clone(), MappingOrigin::UserConfirmed);
        }
        Ok(mapping)
    }

    /// ワイヤー形式（テンプレートラベル → ソース列）に変換する
    ///
    /// カタログのラベルが分類される論理フィールドがマッピング済みであれば、
    /// そのラベルをキーにします。対応するラベルがない論理フィールドは
    /// 論理フィールドのキーで出力します。
    pub fn to_wire(&self, catalog: &TemplateCatalog, table: &RuleTable) -> BTreeMap<String, String> {
        let mut wire = BTreeMap::new();
        let mut labelled = Vec::new();

        for template_field in &catalog.fields {
            if let Some(field) = table.classify_header(&template_field.field_name) {
                if let Some(mapped) = self.entries.get(&field) {
                    wire.insert(template_field.field_name.clone(), mapped.column.clone());
                    labelled.push(field);
                }
            }
        }

        for (field, mapped) in &self.entries {
            if !labelled.contains(field) {
                wire.insert(field.as_str().to_string(), mapped.column.clone());
            }
        }

        wire
    }

    /// 論理フィールドにソース列を割り当てる（既存の割り当ては置き換える）
    ///
    /// 空の列名を渡した場合は割り当てを解除します。
    pub fn assign(&mut self, field: LogicalField, column: impl Into<String>, origin: MappingOrigin) {
        let column = column.into();
        if column.trim().is_empty() {
            self.entries.remove(&field);
        } else {
            self.entries.insert(field, MappedColumn { column, origin });
        }
    }

    /// 割り当てを解除する
    pub fn unassign(&mut self, field: LogicalField) -> Option<MappedColumn> {
        self.entries.remove(&field)
    }

    /// エントリを統合する（同じ論理フィールドは後のエントリで上書き）
    pub fn merge(&mut self, entries: &[MappingEntry]) {
        for entry in entries {
            self.assign(entry.logical_field, entry.source_column.clone(), entry.origin);
        }
    }

    pub fn get(&self, field: LogicalField) -> Option<&MappedColumn> {
        self.entries.get(&field)
    }

    /// 論理フィールドに割り当てられたソース列名
    pub fn column(&self, field: LogicalField) -> Option<&str> {
        self.entries.get(&field).map(|m| m.column.as_str())
    }

    pub fn contains(&self, field: LogicalField) -> bool {
        self.entries.contains_key(&field)
    }

    /// ソース列が割り当てられている論理フィールド（複数ある場合は最初のもの）
    pub fn field_for_source_column(&self, column: &str) -> Option<LogicalField> {
        self.entries
            .iter()
            .find(|(_, m)| m.column == column)
            .map(|(f, _)| *f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LogicalField, &MappedColumn)> {
        self.entries.iter().map(|(f, m)| (*f, m))
    }

    /// マッピング済みの論理フィールド
    pub fn fields(&self) -> Vec<LogicalField> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// マッピングされていない必須フィールド（引数の順序）
    pub fn missing_required(&self, required: &[LogicalField]) -> Vec<LogicalField> {
        required
            .iter()
            .copied()
            .filter(|f| !self.contains(*f))
            .collect()
    }

    /// 必須フィールドがすべてマッピングされていることを検証する
    pub fn ensure_required(&self, required: &[LogicalField]) -> Result<(), SheetMapError> {
        let fields = self.missing_required(required);
        if fields.is_empty() {
            Ok(())
        } else {
            Err(SheetMapError::MissingRequiredField { fields })
        }
    }

    /// すべての値がソーススキーマに存在する列を参照していることを検証する
    pub fn validate_against(&self, source: &SourceTable) -> Result<(), SheetMapError> {
        match self.entries.values().find(|m| !source.has_column(&m.column)) {
            Some(missing) => Err(SheetMapError::UnknownSourceColumn(missing.column.clone())),
            None => Ok(()),
        }
    }
}

/// ワイヤー形式のキーを論理フィールドに解決する
fn resolve_target(key: &str, table: &RuleTable) -> Result<LogicalField, SheetMapError> {
    if let Ok(field) = LogicalField::from_str(key) {
        return Ok(field);
    }
    table
        .classify_header(key)
        .ok_or_else(|| SheetMapError::UnknownMappingTarget(key.to_string()))
}

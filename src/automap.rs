//! Auto Mapper Module
//!
//! テンプレートのフィールドカタログとソース列を論理フィールド経由で対応付けるモジュール。
//!
//! テンプレート側もソース側も同じ分類器（`RuleTable`）で分類し、
//! 論理フィールドが一致した最初のソース列を採用します。

use crate::classify::RuleTable;
use crate::normalize::{fold_case, normalize};
use crate::types::{Confidence, LogicalField, MappingEntry, MappingOrigin, TemplateField};

/// 自動マッピングの解析結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingAnalysis {
    /// 生成されたマッピングエントリ（テンプレートフィールドの順序）
    pub entries: Vec<MappingEntry>,

    /// どのルールにも一致しなかったソース列（ソースの順序）
    pub unresolved_headers: Vec<String>,

    /// 対応するソース列が見つからなかったテンプレートフィールドのラベル
    pub unmapped_template_fields: Vec<String>,
}

/// 自動マッパー
#[derive(Debug, Clone, Copy)]
pub struct AutoMapper<'a> {
    table: &'a RuleTable,
}

impl Default for AutoMapper<'static> {
    fn default() -> Self {
        Self::new(RuleTable::default_rules())
    }
}

impl<'a> AutoMapper<'a> {
    /// 指定したルール表を使う自動マッパーを生成する
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    /// テンプレートフィールドとソース列を自動で対応付ける
    ///
    /// # 引数
    ///
    /// * `template_fields` - テンプレート解析で検出されたフィールド
    /// * `source_columns` - ソースの生のヘッダー（ソースの列順）
    ///
    /// # 戻り値
    ///
    /// マッピングできたテンプレートフィールドのエントリのみを返します。
    /// 入力が空の場合は空のリストを返し、エラーにはなりません。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use sheetmap::{AutoMapper, Confidence, TemplateCatalog};
    ///
    /// let catalog = TemplateCatalog::from_labels(&["Título", "Precio"]);
    /// let entries = AutoMapper::default()
    ///     .auto_map(&catalog.fields, &["Nombre Producto", "Precio"]);
    ///
    /// assert_eq!(entries.len(), 2);
    /// assert_eq!(entries[0].source_column, "Nombre Producto");
    /// assert_eq!(entries[0].confidence(), Some(Confidence::High));
    /// ```
    pub fn auto_map<S: AsRef<str>>(
        &self,
        template_fields: &[TemplateField],
        source_columns: &[S],
    ) -> Vec<MappingEntry> {
        self.analyze(template_fields, source_columns).entries
    }

    /// 自動マッピングを行い、未分類のソース列と未対応のテンプレートフィールドも返す
    pub fn analyze<S: AsRef<str>>(
        &self,
        template_fields: &[TemplateField],
        source_columns: &[S],
    ) -> MappingAnalysis {
        // ソース列は一度だけ分類する
        let classified: Vec<(&str, Option<LogicalField>)> = source_columns
            .iter()
            .map(|c| {
                let raw = c.as_ref();
                (raw, self.table.classify(&normalize(raw)))
            })
            .collect();

        let mut analysis = MappingAnalysis {
            unresolved_headers: classified
                .iter()
                .filter(|(_, field)| field.is_none())
                .map(|(raw, _)| raw.to_string())
                .collect(),
            ..Default::default()
        };

        for template_field in template_fields {
            let Some(field) = self.table.classify_header(&template_field.field_name) else {
                analysis
                    .unmapped_template_fields
                    .push(template_field.field_name.clone());
                continue;
            };

            let Some((source, _)) = classified.iter().find(|(_, f)| *f == Some(field)) else {
                analysis
                    .unmapped_template_fields
                    .push(template_field.field_name.clone());
                continue;
            };

            let confidence = self.confidence_for(source, field, template_field.confidence);
            tracing::debug!(
                template_field = %template_field.field_name,
                source_column = %source,
                logical_field = %field,
                ?confidence,
                "auto-mapped template field"
            );

            analysis.entries.push(MappingEntry {
                source_column: source.to_string(),
                target_field: template_field.field_name.clone(),
                logical_field: field,
                origin: MappingOrigin::Auto(confidence),
                transformation_rule: field.transformation_rule().map(str::to_string),
            });
        }

        analysis
    }

    /// 構造的な信頼度を求め、テンプレートの検出信頼度で上限をかける
    ///
    /// 大文字小文字の違いだけで一致するソース列は`High`、アクセントや区切り文字の
    /// 正規化を経て初めて一致した場合は`Medium`になります。
    fn confidence_for(&self, source: &str, field: LogicalField, detection_score: f32) -> Confidence {
        let structural = if self.table.classify(&fold_case(source)) == Some(field) {
            Confidence::High
        } else {
            Confidence::Medium
        };
        structural.min(Confidence::from_detection_score(detection_score))
    }
}

/// 既定のルール表で自動マッピングを行う
pub fn auto_map<S: AsRef<str>>(
    template_fields: &[TemplateField],
    source_columns: &[S],
) -> Vec<MappingEntry> {
    AutoMapper::default().auto_map(template_fields, source_columns)
}

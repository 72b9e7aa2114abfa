//! Template Writer Module
//!
//! マッピング・編集・既定値・書き込みモードから、値を書き込んだテンプレート文書と
//! ダウンロード用の成果物を生成するモジュール。
//!
//! # 書き込みモード
//!
//! - `fill-empty`: 空のセルにのみ書き込む
//! - `append`: 最後に値が入っている行の次から全ソース行を書き込む
//! - `interactive`: 編集で指定された行のみ、既存の値を上書きして書き込む
//!   （行内のマッピング済み・編集済みの列をすべて書き込む）
//! - `overwrite`: 全行のセルを無条件に上書きする（値が空のセルは消去しない）

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::{ArtifactNaming, WriteMode};
use crate::classify::RuleTable;
use crate::defaults::DefaultSettings;
use crate::edits::EditStage;
use crate::error::SheetMapError;
use crate::formatter::coerce_price;
use crate::grid::{CellValue, TemplateColumns, TemplateGrid};
use crate::mapping::FieldMapping;
use crate::preview::ValueResolver;
use crate::security::validate_artifact_name;
use crate::types::{CellCoord, LogicalField, SourceTable};

/// 成果物ファイル名のデフォルトの接頭辞
pub const DEFAULT_ARTIFACT_PREFIX: &str = "ml_productos_mapeados";

/// 書き込みに必須の論理フィールド（デフォルト）
pub const DEFAULT_REQUIRED_FIELDS: [LogicalField; 2] = [LogicalField::Title, LogicalField::Price];

/// コンテンツアドレス命名で使用するダイジェストの長さ
const DIGEST_NAME_LEN: usize = 16;

/// セルをスキップした理由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// テンプレートのセルに既に値が入っている
    CellNotEmpty { existing: String },

    /// 編集・ソース・既定値のいずれからも値が得られなかった
    NoValue,

    /// 価格を数値に変換できなかった
    InvalidPrice { value: String },

    /// テンプレートに論理フィールドの列がない
    NoTemplateColumn,
}

/// 書き込んだセル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledCell {
    /// テンプレートのラベル
    pub label: String,
    /// A1形式のセル参照
    pub cell: String,
    pub value: CellValue,
}

/// スキップしたセル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCell {
    /// テンプレートのラベル（列がない場合は論理フィールドのキー）
    pub label: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// 1行分の書き込み結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowReport {
    /// 書き込み先の行番号（1始まり）
    pub row: u32,
    pub filled: Vec<FilledCell>,
    pub skipped: Vec<SkippedCell>,
}

/// 書き込み結果の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSummary {
    pub total_products: usize,
    pub fields_filled: usize,
    pub fields_skipped: usize,
}

/// 書き込みレポート
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub write_mode: WriteMode,
    pub rows: Vec<RowReport>,
    pub summary: FillSummary,
}

impl FillReport {
    /// 指定行（1始まり）の結果
    pub fn row(&self, row: u32) -> Option<&RowReport> {
        self.rows.iter().find(|r| r.row == row)
    }
}

/// ダウンロード用の成果物
///
/// 生成後に変更されることはありません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// ファイル名（例: `ml_productos_mapeados_3f2a9c01d4e5b6a7.xlsx`）
    pub filename: String,
    /// 書き込み後のグリッド内容のSHA-256ダイジェスト（16進数）
    pub digest: String,
    /// `.xlsx`形式のバイト列
    pub content: Vec<u8>,
    /// 処理した商品（行）数
    pub products_processed: usize,
}

/// 書き込み結果
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub artifact: Artifact,
    /// 値を書き込んだ後のテンプレート
    pub document: TemplateGrid,
    pub report: FillReport,
}

/// 書き込みの入力一式
#[derive(Debug, Clone, Copy)]
pub struct WriteInput<'a> {
    pub template: &'a TemplateGrid,
    pub mapping: &'a FieldMapping,
    pub source: &'a SourceTable,
    pub edits: &'a EditStage,
    pub defaults: &'a DefaultSettings,
    pub mode: WriteMode,
}

/// 書き込み先の列
#[derive(Debug, Clone)]
enum Target {
    /// 論理フィールドに分類された列
    Field {
        field: LogicalField,
        col: u32,
        label: String,
    },
    /// 分類できないラベルの列（ラベル単位の既定値のみ）
    Label { col: u32, label: String },
}

/// 1行分の書き込み計画
#[derive(Debug, Clone, Copy)]
struct RowPlan {
    source_row: Option<usize>,
    /// 編集を参照する行番号（1始まり、プレビューの行番号）
    edit_row: u32,
    /// 書き込み先の行番号（1始まり）
    dest_row: u32,
}

/// テンプレートライター
#[derive(Debug, Clone)]
pub struct TemplateWriter<'a> {
    table: &'a RuleTable,
    first_data_row: u32,
    required_fields: Vec<LogicalField>,
    naming: ArtifactNaming,
    prefix: String,
}

impl<'a> TemplateWriter<'a> {
    /// # 引数
    ///
    /// * `table` - 分類ルール表
    /// * `first_data_row` - 最初のデータ行（1始まり、2以上）。ヘッダー行はその1行上です。
    pub fn new(table: &'a RuleTable, first_data_row: u32) -> Self {
        Self {
            table,
            first_data_row,
            required_fields: DEFAULT_REQUIRED_FIELDS.to_vec(),
            naming: ArtifactNaming::default(),
            prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
        }
    }

    pub fn with_required_fields(mut self, fields: &[LogicalField]) -> Self {
        self.required_fields = fields.to_vec();
        self
    }

    pub fn with_naming(mut self, naming: ArtifactNaming, prefix: impl Into<String>) -> Self {
        self.naming = naming;
        self.prefix = prefix.into();
        self
    }

    /// ヘッダー行（0始まり）
    fn header_row(&self) -> u32 {
        self.first_data_row.saturating_sub(2)
    }

    /// 書き込み前の検証
    ///
    /// 成果物には一切触れず、入力の状態も変更しません。
    pub fn validate(&self, input: &WriteInput<'_>) -> Result<(), SheetMapError> {
        input.mapping.ensure_required(&self.required_fields)?;
        input.mapping.validate_against(input.source)?;
        if input.mode == WriteMode::Interactive && input.edits.is_empty() {
            return Err(SheetMapError::EditsRequired);
        }
        Ok(())
    }

    /// テンプレートに値を書き込み、成果物を生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(WriteOutcome)` - 成果物、書き込み後の文書、書き込みレポート
    /// * `Err(SheetMapError::MissingRequiredField)` - 必須フィールドがマッピングされていない場合
    /// * `Err(SheetMapError::UnknownSourceColumn)` - マッピングがソースにない列を参照している場合
    /// * `Err(SheetMapError::EditsRequired)` - `interactive`モードで編集がない場合
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use sheetmap::{
    ///     DefaultSettings, EditStage, FieldMapping, LogicalField, MappingOrigin, RuleTable,
    ///     SourceTable, TemplateGrid, TemplateWriter, WriteInput, WriteMode,
    /// };
    ///
    /// let template = TemplateGrid::from_text_rows("Plantilla", &[vec!["Título", "Precio"]]);
    /// let source = SourceTable::new(
    ///     vec!["Nombre".into(), "Precio".into()],
    ///     vec![vec!["Zapato".into(), "$ 1,200".into()]],
    /// );
    /// let mut mapping = FieldMapping::new();
    /// mapping.assign(LogicalField::Title, "Nombre", MappingOrigin::UserConfirmed);
    /// mapping.assign(LogicalField::Price, "Precio", MappingOrigin::UserConfirmed);
    ///
    /// let writer = TemplateWriter::new(RuleTable::default_rules(), 2);
    /// let outcome = writer.write(&WriteInput {
    ///     template: &template,
    ///     mapping: &mapping,
    ///     source: &source,
    ///     edits: &EditStage::new(2),
    ///     defaults: &DefaultSettings::default(),
    ///     mode: WriteMode::FillEmpty,
    /// }).unwrap();
    ///
    /// assert_eq!(outcome.report.summary.fields_filled, 2);
    /// assert_eq!(outcome.document.get(1, 1).map(|c| c.as_text()), Some("1200".to_string()));
    /// ```
    pub fn write(&self, input: &WriteInput<'_>) -> Result<WriteOutcome, SheetMapError> {
        self.validate(input)?;

        if input.mode == WriteMode::Overwrite {
            tracing::warn!(
                "overwrite mode replaces populated template cells; keep a backup of the template"
            );
        }

        let header_row = input
            .template
            .locate_header_row(self.header_row(), self.table);
        let columns = input.template.detect_columns(header_row, self.table);
        let targets = self.targets(&columns);
        let plans = self.plans(input);

        let resolver = ValueResolver {
            mapping: input.mapping,
            source: input.source,
            edits: input.edits,
            defaults: input.defaults,
            table: self.table,
        };

        // 各行の判断は元のテンプレートのみに依存するため並列に計算し、適用は行順に行う
        let row_results: Vec<(RowReport, Vec<(CellCoord, CellValue)>)> = plans
            .par_iter()
            .map(|plan| self.plan_row(input, &resolver, &columns, &targets, *plan))
            .collect();

        let mut document = input.template.clone();
        let mut rows = Vec::with_capacity(row_results.len());
        for (report, writes) in row_results {
            for (coord, value) in writes {
                document.set(coord.row, coord.col, value)?;
            }
            rows.push(report);
        }

        let summary = FillSummary {
            total_products: plans.len(),
            fields_filled: rows.iter().map(|r| r.filled.len()).sum(),
            fields_skipped: rows.iter().map(|r| r.skipped.len()).sum(),
        };

        let digest = document.digest()?;
        let filename = self.artifact_name(&digest)?;
        let content = document.to_xlsx_bytes()?;

        tracing::info!(
            write_mode = %input.mode,
            products = summary.total_products,
            filled = summary.fields_filled,
            skipped = summary.fields_skipped,
            artifact = %filename,
            "wrote template"
        );

        Ok(WriteOutcome {
            artifact: Artifact {
                filename,
                digest,
                content,
                products_processed: summary.total_products,
            },
            document,
            report: FillReport {
                write_mode: input.mode,
                rows,
                summary,
            },
        })
    }

    /// ヘッダー行の各列を書き込み先として列挙する
    ///
    /// 同じ論理フィールドに分類される2列目以降は対象外です。
    fn targets(&self, columns: &TemplateColumns) -> Vec<Target> {
        columns
            .labels()
            .iter()
            .filter_map(|(col, label)| match self.table.classify_header(label) {
                Some(field) if columns.column(field) == Some(*col) => Some(Target::Field {
                    field,
                    col: *col,
                    label: label.clone(),
                }),
                Some(_) => None,
                None => Some(Target::Label {
                    col: *col,
                    label: label.clone(),
                }),
            })
            .collect()
    }

    /// 書き込みモードに応じた行の計画
    ///
    /// 編集はプレビューと同じ行番号（`first_data_row + i`）で参照します。`append`では
    /// 書き込み先の行がずれても、編集はソース行に追従します。ソース行を越える行への
    /// 編集は、編集と既定値のみで行を書き込みます。
    fn plans(&self, input: &WriteInput<'_>) -> Vec<RowPlan> {
        let count = input.source.row_count();
        let base = match input.mode {
            WriteMode::FillEmpty | WriteMode::Overwrite => self.first_data_row,
            WriteMode::Append => {
                // 最初のデータ行以降で値が入っている最後の行の次の行から
                input
                    .template
                    .last_populated_row(self.first_data_row.saturating_sub(1))
                    .map_or(self.first_data_row, |last| last + 2)
            }
            WriteMode::Interactive => {
                return input
                    .edits
                    .rows()
                    .into_iter()
                    .map(|row| RowPlan {
                        source_row: row
                            .checked_sub(self.first_data_row)
                            .map(|offset| offset as usize)
                            .filter(|offset| *offset < count),
                        edit_row: row,
                        dest_row: row,
                    })
                    .collect();
            }
        };

        let source_end = self.first_data_row.saturating_add(count as u32);
        let source_rows = (0..count).map(|i| (Some(i), self.first_data_row + i as u32));
        let edit_only_rows = input
            .edits
            .rows()
            .into_iter()
            .filter(|row| *row >= source_end)
            .map(|row| (None, row));

        source_rows
            .chain(edit_only_rows)
            .map(|(source_row, edit_row)| RowPlan {
                source_row,
                edit_row,
                dest_row: base.saturating_add(edit_row.saturating_sub(self.first_data_row)),
            })
            .collect()
    }

    /// 1行分のセルを判断する（テンプレートは変更しない）
    fn plan_row(
        &self,
        input: &WriteInput<'_>,
        resolver: &ValueResolver<'_>,
        columns: &TemplateColumns,
        targets: &[Target],
        plan: RowPlan,
    ) -> (RowReport, Vec<(CellCoord, CellValue)>) {
        let mut report = RowReport {
            row: plan.dest_row,
            ..Default::default()
        };
        let mut writes = Vec::new();
        let row0 = plan.dest_row.saturating_sub(1);

        let edited: Vec<LogicalField> = input
            .edits
            .row_edits(plan.edit_row)
            .map(|(field, _)| field)
            .collect();
        let in_scope = |field: LogicalField| {
            input.mode != WriteMode::Interactive
                || input.mapping.contains(field)
                || edited.contains(&field)
        };

        for target in targets {
            let (col, label, value, field) = match target {
                Target::Field { field, col, label } => {
                    if !in_scope(*field) {
                        continue;
                    }
                    let value = resolver.resolve(plan.source_row, plan.edit_row, *field);
                    (*col, label, value, Some(*field))
                }
                Target::Label { col, label } => {
                    if input.mode == WriteMode::Interactive {
                        continue;
                    }
                    let value = input.defaults.value_for_label(label).map(str::to_string);
                    (*col, label, value, None)
                }
            };
            let value = value.filter(|v| !v.trim().is_empty());

            let cell_value = match (field, value) {
                (Some(LogicalField::Price), Some(raw)) => match coerce_price(&raw) {
                    Some(price) => Some(CellValue::Number(price)),
                    None => {
                        report.skipped.push(SkippedCell {
                            label: label.clone(),
                            reason: SkipReason::InvalidPrice { value: raw },
                        });
                        continue;
                    }
                },
                (_, value) => value.map(CellValue::Text),
            };

            if !input.mode.may_overwrite() && !input.template.is_cell_empty(row0, col) {
                let existing = input
                    .template
                    .get(row0, col)
                    .map(CellValue::as_text)
                    .unwrap_or_default();
                report.skipped.push(SkippedCell {
                    label: label.clone(),
                    reason: SkipReason::CellNotEmpty { existing },
                });
                continue;
            }

            match cell_value {
                Some(value) => {
                    let coord = CellCoord::new(row0, col);
                    report.filled.push(FilledCell {
                        label: label.clone(),
                        cell: coord.to_a1_notation(),
                        value: value.clone(),
                    });
                    writes.push((coord, value));
                }
                None => report.skipped.push(SkippedCell {
                    label: label.clone(),
                    reason: SkipReason::NoValue,
                }),
            }
        }

        // マッピングまたは編集があるのにテンプレートに列がないフィールド
        let mut orphaned: Vec<LogicalField> = input
            .mapping
            .fields()
            .into_iter()
            .chain(edited.iter().copied())
            .filter(|f| columns.column(*f).is_none())
            .collect();
        orphaned.sort();
        orphaned.dedup();
        report
            .skipped
            .extend(orphaned.into_iter().map(|field| SkippedCell {
                label: field.as_str().to_string(),
                reason: SkipReason::NoTemplateColumn,
            }));

        (report, writes)
    }

    /// 成果物のファイル名を生成する
    fn artifact_name(&self, digest: &str) -> Result<String, SheetMapError> {
        let suffix = match self.naming {
            ArtifactNaming::ContentAddressed => digest[..DIGEST_NAME_LEN.min(digest.len())].to_string(),
            ArtifactNaming::Timestamped => chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        };
        let filename = format!("{}_{}.xlsx", self.prefix, suffix);
        validate_artifact_name(&filename).map_err(SheetMapError::SecurityViolation)?;
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::CustomDefault;
    use crate::types::MappingOrigin;

    const FIRST_DATA_ROW: u32 = 3;

    /// 1行目: 説明、2行目: ヘッダー、3行目以降: データ
    fn template() -> TemplateGrid {
        TemplateGrid::from_text_rows(
            "Plantilla",
            &[
                vec!["Completa los datos", "", "", "", ""],
                vec!["Título", "Precio", "Stock", "Condición", "Notas del vendedor"],
                vec!["", "999", "", "", ""],
            ],
        )
    }

    fn source() -> SourceTable {
        SourceTable::new(
            vec!["Nombre".into(), "Precio".into(), "Cantidad".into(), "Marca".into()],
            vec![
                vec!["Zapato".into(), "100".into(), "5".into(), "Acme".into()],
                vec!["Bota".into(), "consultar".into(), "".into(), "Acme".into()],
            ],
        )
    }

    fn mapping() -> FieldMapping {
        let mut mapping = FieldMapping::new();
        mapping.assign(LogicalField::Title, "Nombre", MappingOrigin::UserConfirmed);
        mapping.assign(LogicalField::Price, "Precio", MappingOrigin::UserConfirmed);
        mapping.assign(LogicalField::Stock, "Cantidad", MappingOrigin::UserConfirmed);
        mapping
    }

    fn writer() -> TemplateWriter<'static> {
        TemplateWriter::new(RuleTable::default_rules(), FIRST_DATA_ROW)
    }

    fn write(
        mode: WriteMode,
        mapping: &FieldMapping,
        edits: &EditStage,
        defaults: &DefaultSettings,
    ) -> Result<WriteOutcome, SheetMapError> {
        let template = template();
        let source = source();
        writer().write(&WriteInput {
            template: &template,
            mapping,
            source: &source,
            edits,
            defaults,
            mode,
        })
    }

    fn text(outcome: &WriteOutcome, row: u32, col: u32) -> String {
        outcome
            .document
            .get(row, col)
            .map(CellValue::as_text)
            .unwrap_or_default()
    }

    #[test]
    fn test_fill_empty_keeps_populated_cells() {
        let outcome = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        assert_eq!(text(&outcome, 2, 0), "Zapato");
        assert_eq!(text(&outcome, 2, 1), "999");
        assert_eq!(text(&outcome, 2, 2), "5");

        let row = outcome.report.row(3).unwrap();
        assert!(row.skipped.contains(&SkippedCell {
            label: "Precio".to_string(),
            reason: SkipReason::CellNotEmpty {
                existing: "999".to_string()
            },
        }));
    }

    #[test]
    fn test_overwrite_replaces_mapped_cells() {
        let outcome = write(
            WriteMode::Overwrite,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        assert_eq!(outcome.document.get(2, 1), Some(&CellValue::Number(100.0)));
        assert_eq!(outcome.report.summary.total_products, 2);
    }

    #[test]
    fn test_invalid_price_is_skipped() {
        let outcome = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        let row = outcome.report.row(4).unwrap();
        assert!(row.skipped.contains(&SkippedCell {
            label: "Precio".to_string(),
            reason: SkipReason::InvalidPrice {
                value: "consultar".to_string()
            },
        }));
        assert!(outcome.document.is_cell_empty(3, 1));
    }

    #[test]
    fn test_no_value_never_clears_cells() {
        let outcome = write(
            WriteMode::Overwrite,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        let row = outcome.report.row(4).unwrap();
        assert!(row.skipped.contains(&SkippedCell {
            label: "Stock".to_string(),
            reason: SkipReason::NoValue,
        }));
    }

    #[test]
    fn test_defaults_and_label_defaults() {
        let defaults = DefaultSettings {
            condition: Some("used".to_string()),
            custom_defaults: vec![CustomDefault {
                field: "Notas del vendedor".to_string(),
                value: "Envío en 24h".to_string(),
            }],
            ..Default::default()
        };
        let outcome = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &defaults,
        )
        .unwrap();

        assert_eq!(text(&outcome, 2, 3), "Usado");
        assert_eq!(text(&outcome, 2, 4), "Envío en 24h");
        // 既定値の設定があれば在庫は1
        assert_eq!(text(&outcome, 3, 2), "1");
    }

    #[test]
    fn test_append_starts_after_last_populated_row() {
        let outcome = write(
            WriteMode::Append,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        // 3行目（0始まりで2）は既存のまま
        assert!(outcome.document.is_cell_empty(2, 0));
        assert_eq!(text(&outcome, 3, 0), "Zapato");
        assert_eq!(text(&outcome, 4, 0), "Bota");
        assert_eq!(outcome.report.rows[0].row, 4);
    }

    #[test]
    fn test_append_carries_edits_with_their_source_row() {
        let mut edits = EditStage::new(FIRST_DATA_ROW);
        // プレビューの3行目（Zapato）に対する編集
        edits.set(3, LogicalField::Price, "150").unwrap();

        let outcome = write(WriteMode::Append, &mapping(), &edits, &DefaultSettings::default()).unwrap();

        // Zapatoは4行目に追記され、編集もその行に反映される
        assert_eq!(text(&outcome, 3, 0), "Zapato");
        assert_eq!(outcome.document.get(3, 1), Some(&CellValue::Number(150.0)));
        // 既存の3行目には触れない
        assert_eq!(text(&outcome, 2, 1), "999");

        let row = outcome.report.row(4).unwrap();
        assert!(row
            .filled
            .iter()
            .any(|c| c.label == "Precio" && c.value == CellValue::Number(150.0)));
    }

    #[test]
    fn test_edits_past_source_rows_are_written() {
        for mode in [WriteMode::FillEmpty, WriteMode::Overwrite] {
            let mut edits = EditStage::new(FIRST_DATA_ROW);
            edits.set(6, LogicalField::Price, "300").unwrap();

            let outcome = write(mode, &mapping(), &edits, &DefaultSettings::default()).unwrap();

            assert_eq!(outcome.document.get(5, 1), Some(&CellValue::Number(300.0)), "{}", mode);
            let row = outcome.report.row(6).unwrap();
            assert_eq!(row.filled.len(), 1);
            assert!(row.skipped.contains(&SkippedCell {
                label: "Título".to_string(),
                reason: SkipReason::NoValue,
            }));
            assert_eq!(outcome.report.summary.total_products, 3);
        }
    }

    #[test]
    fn test_append_edits_past_source_rows_keep_their_offset() {
        let mut edits = EditStage::new(FIRST_DATA_ROW);
        edits.set(6, LogicalField::Price, "300").unwrap();

        let outcome = write(WriteMode::Append, &mapping(), &edits, &DefaultSettings::default()).unwrap();

        // 追記は4行目から始まるため、プレビューの6行目は7行目に書き込まれる
        assert_eq!(outcome.document.get(6, 1), Some(&CellValue::Number(300.0)));
        assert!(outcome.report.row(7).is_some());
    }

    #[test]
    fn test_header_row_fallback_when_expected_row_is_empty() {
        let template = TemplateGrid::from_text_rows(
            "Plantilla",
            &[
                vec!["Título", "Precio", "Stock"],
                vec!["Completa los datos", "", ""],
            ],
        );
        let source = source();
        let outcome = writer()
            .write(&WriteInput {
                template: &template,
                mapping: &mapping(),
                source: &source,
                edits: &EditStage::new(FIRST_DATA_ROW),
                defaults: &DefaultSettings::default(),
                mode: WriteMode::FillEmpty,
            })
            .unwrap();

        assert_eq!(text(&outcome, 2, 0), "Zapato");
        assert_eq!(outcome.document.get(2, 1), Some(&CellValue::Number(100.0)));
        assert!(outcome
            .report
            .rows
            .iter()
            .flat_map(|r| r.skipped.iter())
            .all(|s| s.reason != SkipReason::NoTemplateColumn));
    }

    #[test]
    fn test_edit_rows_are_bounded_by_worksheet() {
        let mut edits = EditStage::new(FIRST_DATA_ROW);
        assert!(matches!(
            edits.set(3_000_000_000, LogicalField::Price, "5"),
            Err(SheetMapError::RowOutOfRange { .. })
        ));
        edits.set(crate::grid::MAX_ROWS, LogicalField::Price, "5").unwrap();

        let outcome = write(
            WriteMode::Interactive,
            &mapping(),
            &edits,
            &DefaultSettings::default(),
        )
        .unwrap();
        assert_eq!(
            outcome.report.rows[0].filled[0].cell,
            format!("B{}", crate::grid::MAX_ROWS)
        );
    }

    #[test]
    fn test_interactive_requires_edits() {
        let result = write(
            WriteMode::Interactive,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        );
        assert!(matches!(result, Err(SheetMapError::EditsRequired)));
    }

    #[test]
    fn test_interactive_touches_only_edited_rows() {
        let mut edits = EditStage::new(FIRST_DATA_ROW);
        edits.set(3, LogicalField::Price, "150").unwrap();

        let outcome = write(
            WriteMode::Interactive,
            &mapping(),
            &edits,
            &DefaultSettings::default(),
        )
        .unwrap();

        // 編集がある行のみ、既存の値を上書き
        assert_eq!(outcome.document.get(2, 1), Some(&CellValue::Number(150.0)));
        assert_eq!(text(&outcome, 2, 0), "Zapato");
        assert!(outcome.document.is_cell_empty(3, 0));
        assert_eq!(outcome.artifact.products_processed, 1);
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut mapping = FieldMapping::new();
        mapping.assign(LogicalField::Description, "Nombre", MappingOrigin::UserConfirmed);

        let result = write(
            WriteMode::FillEmpty,
            &mapping,
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        );
        match result {
            Err(SheetMapError::MissingRequiredField { fields }) => {
                assert_eq!(fields, vec![LogicalField::Title, LogicalField::Price]);
            }
            other => panic!("Expected MissingRequiredField, got {:?}", other.map(|o| o.artifact.filename)),
        }
    }

    #[test]
    fn test_unknown_source_column_rejected() {
        let mut mapping = mapping();
        mapping.assign(LogicalField::Sku, "Código", MappingOrigin::UserConfirmed);

        let result = write(
            WriteMode::FillEmpty,
            &mapping,
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        );
        assert!(matches!(result, Err(SheetMapError::UnknownSourceColumn(_))));
    }

    #[test]
    fn test_mapped_field_without_template_column() {
        let mut mapping = mapping();
        mapping.assign(LogicalField::Brand, "Marca", MappingOrigin::UserConfirmed);

        let outcome = write(
            WriteMode::FillEmpty,
            &mapping,
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        let row = outcome.report.row(3).unwrap();
        assert!(row.skipped.contains(&SkippedCell {
            label: "brand".to_string(),
            reason: SkipReason::NoTemplateColumn,
        }));
    }

    #[test]
    fn test_content_addressed_name_is_stable() {
        let a = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();
        let b = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();

        assert_eq!(a.artifact.filename, b.artifact.filename);
        assert!(a.artifact.filename.starts_with("ml_productos_mapeados_"));
        assert_eq!(a.artifact.filename.len(), "ml_productos_mapeados_".len() + 16 + 5);
        assert!(a.artifact.content.starts_with(b"PK"));
    }

    #[test]
    fn test_timestamped_name() {
        let template = template();
        let source = source();
        let outcome = writer()
            .with_naming(ArtifactNaming::Timestamped, "lote")
            .write(&WriteInput {
                template: &template,
                mapping: &mapping(),
                source: &source,
                edits: &EditStage::new(FIRST_DATA_ROW),
                defaults: &DefaultSettings::default(),
                mode: WriteMode::FillEmpty,
            })
            .unwrap();

        // lote_YYYYmmdd_HHMMSS.xlsx
        assert!(outcome.artifact.filename.starts_with("lote_"));
        assert_eq!(outcome.artifact.filename.len(), "lote_".len() + 15 + 5);
    }

    #[test]
    fn test_fill_empty_is_idempotent_against_original_template() {
        let first = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();
        let second = write(
            WriteMode::FillEmpty,
            &mapping(),
            &EditStage::new(FIRST_DATA_ROW),
            &DefaultSettings::default(),
        )
        .unwrap();
        assert_eq!(first.document, second.document);
        assert_eq!(first.report, second.report);
    }
}

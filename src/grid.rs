//! Grid Module
//!
//! テンプレート文書を稠密なセルグリッドとして保持するモジュール。
//! ヘッダー行からの列検出、内容ダイジェストの計算、`.xlsx`への書き出しを提供します。

use std::collections::BTreeMap;

use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classify::RuleTable;
use crate::error::SheetMapError;
use crate::formatter::NumberFormatter;
use crate::types::{LogicalField, TemplateCatalog, TemplateField};

/// Excelの最大行数
pub const MAX_ROWS: u32 = 1_048_576;

/// Excelの最大列数
const MAX_COLUMNS: u32 = 16_384;

/// ヘッダー行が見つからない場合に探索する先頭の行数
const HEADER_SCAN_ROWS: u32 = 12;

/// テンプレートのセル値
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// 文字列からセル値を生成（空文字列は`Empty`）
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text)
        }
    }

    /// 値を保持していないかどうか（空白のみの文字列も空とみなす）
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// 表示用の文字列
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => NumberFormatter.format(*n),
        }
    }
}

/// テンプレートの列配置
///
/// ヘッダー行の各セルを分類して得られた、論理フィールドごとの書き込み先列です。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateColumns {
    by_field: BTreeMap<LogicalField, u32>,
    labels: Vec<(u32, String)>,
}

impl TemplateColumns {
    /// 論理フィールドの書き込み先列（0始まり）
    pub fn column(&self, field: LogicalField) -> Option<u32> {
        self.by_field.get(&field).copied()
    }

    /// ラベルが完全一致する列（0始まり）
    pub fn label_column(&self, label: &str) -> Option<u32> {
        self.labels
            .iter()
            .find(|(_, l)| l == label)
            .map(|(col, _)| *col)
    }

    /// ヘッダー行のラベル（列順）
    pub fn labels(&self) -> &[(u32, String)] {
        &self.labels
    }
}

/// テンプレート文書のグリッド
///
/// 行・列はいずれも0始まりです。Excelの行番号（1始まり）は`row + 1`に対応します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateGrid {
    sheet_name: String,
    cells: Vec<Vec<CellValue>>,
}

impl Default for TemplateGrid {
    fn default() -> Self {
        Self::new("Sheet1")
    }
}

impl TemplateGrid {
    /// 空のグリッドを生成
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            cells: Vec::new(),
        }
    }

    /// 行データからグリッドを生成
    pub fn from_rows(sheet_name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            cells: rows,
        }
    }

    /// 文字列の行データからグリッドを生成（空文字列は空セル）
    pub fn from_text_rows<S: AsRef<str>>(sheet_name: impl Into<String>, rows: &[Vec<S>]) -> Self {
        Self::from_rows(
            sheet_name,
            rows.iter()
                .map(|row| row.iter().map(|c| CellValue::from_text(c.as_ref())).collect())
                .collect(),
        )
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// 行数
    pub fn row_count(&self) -> u32 {
        self.cells.len() as u32
    }

    /// 列数（最も長い行の長さ）
    pub fn col_count(&self) -> u32 {
        self.cells.iter().map(|r| r.len()).max().unwrap_or(0) as u32
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
    }

    /// セルが空かどうか（グリッドの範囲外も空とみなす）
    pub fn is_cell_empty(&self, row: u32, col: u32) -> bool {
        self.get(row, col).map_or(true, CellValue::is_empty)
    }

    /// セル値を設定（必要に応じてグリッドを拡張）
    pub fn set(&mut self, row: u32, col: u32, value: CellValue) -> Result<(), SheetMapError> {
        if row >= MAX_ROWS {
            return Err(SheetMapError::Config(format!(
                "Row index {} exceeds the worksheet limit of {}",
                row, MAX_ROWS
            )));
        }
        if col >= MAX_COLUMNS {
            return Err(SheetMapError::Config(format!(
                "Column index {} exceeds the worksheet limit of {}",
                col, MAX_COLUMNS
            )));
        }
        let (row, col) = (row as usize, col as usize);
        if self.cells.len() <= row {
            self.cells.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.cells[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
        Ok(())
    }

    /// 行の内容（0始まり）
    pub fn row(&self, row: u32) -> &[CellValue] {
        self.cells
            .get(row as usize)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// `from_row`以降で値を保持している最後の行（0始まり）
    pub fn last_populated_row(&self, from_row: u32) -> Option<u32> {
        (from_row..self.row_count())
            .rev()
            .find(|&r| self.row(r).iter().any(|c| !c.is_empty()))
    }

    /// ヘッダー行から書き込み先の列を検出する
    ///
    /// # 引数
    ///
    /// * `header_row` - ヘッダー行（0始まり）
    /// * `table` - 分類ルール表
    ///
    /// 同じ論理フィールドに分類される列が複数ある場合は最も左の列を採用します。
    pub fn detect_columns(&self, header_row: u32, table: &RuleTable) -> TemplateColumns {
        let mut columns = TemplateColumns::default();

        for (col, cell) in self.row(header_row).iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let label = cell.as_text().trim().to_string();
            let col = col as u32;
            if let Some(field) = table.classify_header(&label) {
                columns.by_field.entry(field).or_insert(col);
            }
            columns.labels.push((col, label));
        }

        tracing::debug!(
            header_row = header_row + 1,
            detected = columns.by_field.len(),
            labels = columns.labels.len(),
            "detected template columns"
        );
        columns
    }

    /// 論理フィールドを含むヘッダー行を探す（0始まり）
    ///
    /// 指定した`header_row`で論理フィールドに分類できる列が1つもない場合は、
    /// 先頭の12行から分類できる列が最も多い行（同数なら上の行）を採用します。
    /// どの行でも見つからなければ`header_row`をそのまま返します。
    pub fn locate_header_row(&self, header_row: u32, table: &RuleTable) -> u32 {
        let classified = |row: u32| -> usize {
            let mut fields: Vec<LogicalField> = self
                .row(row)
                .iter()
                .filter(|c| !c.is_empty())
                .filter_map(|c| table.classify_header(c.as_text().trim()))
                .collect();
            fields.sort();
            fields.dedup();
            fields.len()
        };

        if classified(header_row) > 0 {
            return header_row;
        }

        let mut best: Option<(u32, usize)> = None;
        for row in 0..HEADER_SCAN_ROWS.min(self.row_count()) {
            let count = classified(row);
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((row, count));
            }
        }

        match best {
            Some((row, fields)) => {
                tracing::info!(
                    expected = header_row + 1,
                    found = row + 1,
                    fields,
                    "template header not found on the expected row; using detected header row"
                );
                row
            }
            None => header_row,
        }
    }

    /// ヘッダー行からテンプレートのフィールドカタログを生成する
    pub fn catalog(&self, header_row: u32) -> TemplateCatalog {
        TemplateCatalog::new(
            self.row(header_row)
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_empty())
                .map(|(col, c)| TemplateField::new(c.as_text().trim(), col))
                .collect(),
        )
    }

    /// グリッド内容のSHA-256ダイジェスト（16進数）
    ///
    /// シート名とすべてのセル（型を含む）から計算され、同じ内容のグリッドは
    /// 常に同じダイジェストになります。
    pub fn digest(&self) -> Result<String, SheetMapError> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    /// `.xlsx`形式のバイト列に書き出す
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, SheetMapError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name)?;

        for (row_idx, row) in self.cells.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let (r, c) = (row_idx as u32, col_idx as u16);
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

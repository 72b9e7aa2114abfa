//! Workbook Reader
//!
//! calamineのラッパーとして、シートの選択とセル値の変換を行います。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::{Cursor, Read};

use crate::api::SheetSelector;
use crate::error::SheetMapError;
use crate::formatter::CellFormatter;
use crate::grid::{CellValue, TemplateGrid};
use crate::security::SecurityConfig;
use crate::types::SourceTable;

/// ワークブックリーダー
///
/// 入力全体をメモリに読み込んでから開きます。形式（xlsx/xls/ods）はcalamineが判定します。
pub(crate) struct WorkbookReader {
    sheets: Sheets<Cursor<Vec<u8>>>,
    formatter: CellFormatter,
}

impl WorkbookReader {
    /// ワークブックを開く
    ///
    /// # 引数
    ///
    /// * `reader` - ワークブックのバイト列を読み込むためのリーダー
    /// * `security` - 入力サイズの上限を含むセキュリティ設定
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookReader)` - 読み込みに成功した場合
    /// * `Err(SheetMapError::SecurityViolation)` - 入力サイズが上限を超える場合
    /// * `Err(SheetMapError::Parse)` - ワークブックとして解析できない場合
    pub fn open<R: Read>(mut reader: R, security: &SecurityConfig) -> Result<Self, SheetMapError> {
        let mut buffer = Vec::new();
        // 上限を1バイト超えて読めた時点で打ち切る
        let limit = security.max_input_file_size.saturating_add(1);
        reader.by_ref().take(limit).read_to_end(&mut buffer)?;
        security.check_input_size(buffer.len() as u64)?;

        let sheets = open_workbook_auto_from_rs(Cursor::new(buffer))?;
        Ok(Self {
            sheets,
            formatter: CellFormatter::new(),
        })
    }

    /// すべてのシート名
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    /// シート選択方式に基づいてシート名を解決する
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - 選択されたシート名
    /// * `Err(SheetMapError::Config)` - シートが見つからない、またはインデックスが範囲外の場合
    pub fn select_sheet(&self, selector: &SheetSelector) -> Result<String, SheetMapError> {
        let names = self.sheet_names();
        match selector {
            SheetSelector::Index(index) => names.get(*index).cloned().ok_or_else(|| {
                SheetMapError::Config(format!(
                    "Sheet index {} is out of range (total: {})",
                    index,
                    names.len()
                ))
            }),
            SheetSelector::Name(name) => {
                if !names.contains(name) {
                    return Err(SheetMapError::Config(format!("Sheet '{}' not found", name)));
                }
                Ok(name.clone())
            }
        }
    }

    fn range(&mut self, selector: &SheetSelector) -> Result<(String, Range<Data>), SheetMapError> {
        let name = self.select_sheet(selector)?;
        let range = self.sheets.worksheet_range(&name)?;
        Ok((name, range))
    }

    /// シートをテンプレートグリッドとして読み込む
    ///
    /// セル位置はシート上の絶対位置（A1が`(0, 0)`）を保持します。
    /// 整数・小数は数値として、それ以外は文字列として保持します。
    pub fn read_grid(&mut self, selector: &SheetSelector) -> Result<TemplateGrid, SheetMapError> {
        let (name, range) = self.range(selector)?;
        let mut grid = TemplateGrid::new(name);

        let Some((start_row, start_col)) = range.start() else {
            return Ok(grid);
        };

        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let value = self.formatter.to_cell_value(cell)?;
                if value == CellValue::Empty {
                    continue;
                }
                grid.set(start_row + row_idx as u32, start_col + col_idx as u32, value)?;
            }
        }

        tracing::debug!(
            sheet = grid.sheet_name(),
            rows = grid.row_count(),
            cols = grid.col_count(),
            "read template grid"
        );
        Ok(grid)
    }

    /// シートを商品データの表として読み込む
    ///
    /// 使用範囲の最初の行をヘッダーとし、以降の行をデータとします。
    /// すべてのセルが空の行は読み飛ばします。空のヘッダーは`Unnamed: <列番号>`になります。
    ///
    /// # 戻り値
    ///
    /// * `Ok(SourceTable)` - 読み込みに成功した場合
    /// * `Err(SheetMapError::SecurityViolation)` - 行数が上限を超える場合
    pub fn read_table(
        &mut self,
        selector: &SheetSelector,
        security: &SecurityConfig,
    ) -> Result<SourceTable, SheetMapError> {
        let (name, range) = self.range(selector)?;
        let mut rows = range.rows();

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(col, cell)| {
                    let text = self.formatter.format_data(cell)?;
                    let text = text.trim();
                    Ok(if text.is_empty() {
                        format!("Unnamed: {}", col)
                    } else {
                        text.to_string()
                    })
                })
                .collect::<Result<_, SheetMapError>>()?,
            None => Vec::new(),
        };

        let mut data = Vec::new();
        for row in rows {
            let values = row
                .iter()
                .map(|cell| self.formatter.format_data(cell))
                .collect::<Result<Vec<_>, _>>()?;
            if values.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            data.push(values);
            security.check_source_rows(data.len())?;
        }

        tracing::debug!(
            sheet = %name,
            columns = headers.len(),
            rows = data.len(),
            "read source table"
        );
        Ok(SourceTable::new(headers, data))
    }
}

// テストは統合テスト（tests/）で実装します。
// 実際のXLSXファイルが必要なため、単体テストではなく統合テストとして実装します。

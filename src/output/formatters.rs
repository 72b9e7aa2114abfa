//! Output Formatters Implementation
//!
//! 各出力フォーマットの実装を提供するモジュール。

use std::io::Write;

use unicode_width::UnicodeWidthStr;

use crate::error::SheetMapError;
use crate::preview::Preview;

/// 行番号列の見出し
const ROW_HEADER: &str = "Fila";

/// Markdown形式のフォーマッター
///
/// 先頭に書き込み先の行番号列を持つテーブルを出力します。
/// 列幅は表示幅（全角文字は2）で揃えます。
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn render<W: Write>(&self, preview: &Preview, writer: &mut W) -> Result<(), SheetMapError> {
        if preview.headers.is_empty() {
            return Ok(());
        }

        let table = table_rows(preview, escape_markdown);

        // 1. 列幅の計算
        let col_widths = calculate_column_widths(&table);

        // 2. 各行の出力
        for (row_idx, row) in table.iter().enumerate() {
            write!(writer, "|")?;
            for (col_idx, content) in row.iter().enumerate() {
                let width = col_widths[col_idx];
                // 表示幅を計算（全角文字は2、半角文字は1）
                let content_width = content.width();
                write!(writer, " {}", content)?;
                // 残りのスペースを埋める（表示幅に基づく）
                for _ in content_width..width {
                    write!(writer, " ")?;
                }
                write!(writer, " |")?;
            }
            writeln!(writer)?;

            // 最初の行の後に区切り行を挿入
            if row_idx == 0 {
                writeln!(writer, "{}", generate_separator(&col_widths))?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

/// JSON形式のフォーマッター
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn render<W: Write>(&self, preview: &Preview, writer: &mut W) -> Result<(), SheetMapError> {
        serde_json::to_writer_pretty(&mut *writer, preview)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// CSV形式のフォーマッター
pub struct CsvFormatter;

impl CsvFormatter {
    pub fn render<W: Write>(&self, preview: &Preview, writer: &mut W) -> Result<(), SheetMapError> {
        if preview.headers.is_empty() {
            return Ok(());
        }

        for row in table_rows(preview, escape_csv) {
            writeln!(writer, "{}", row.join(","))?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// 見出し行を含むテーブルの全行を生成する
fn table_rows(preview: &Preview, escape: fn(&str) -> String) -> Vec<Vec<String>> {
    let header = std::iter::once(escape(ROW_HEADER))
        .chain(preview.headers.iter().map(|h| escape(h)))
        .collect();

    std::iter::once(header)
        .chain(preview.rows.iter().map(|row| {
            std::iter::once(row.row.to_string())
                .chain(row.cells.iter().map(|c| escape(&c.value)))
                .collect()
        }))
        .collect()
}

/// 列幅を計算
///
/// 最小幅は3文字（区切り行の最小幅）です。
fn calculate_column_widths(table: &[Vec<String>]) -> Vec<usize> {
    let cols = table.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![3; cols];
    for row in table {
        for (col_idx, content) in row.iter().enumerate() {
            widths[col_idx] = widths[col_idx].max(content.width());
        }
    }
    widths
}

/// ヘッダー区切り行を生成
///
/// セルの前後のスペース（各1文字）を含めた幅のハイフンを`|`で連結します。
fn generate_separator(col_widths: &[usize]) -> String {
    let mut separator = String::from("|");
    for &width in col_widths {
        separator.push_str(&"-".repeat(width + 2));
        separator.push('|');
    }
    separator
}

/// Markdownテーブルのセル内容をエスケープ
///
/// パイプ文字をエスケープし、改行は空白に置き換えます。
fn escape_markdown(s: &str) -> String {
    s.trim()
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// CSV文字列をエスケープ
///
/// ダブルクォート、改行、カンマを含む場合はダブルクォートで囲み、
/// 内部のダブルクォートは2つにエスケープします。
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

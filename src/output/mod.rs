//! Output Format Module
//!
//! Strategy Patternによるプレビュー出力フォーマットの抽象化を提供するモジュール。

mod formatters;

use crate::error::SheetMapError;
use crate::preview::Preview;
use std::io::Write;

pub use formatters::*;

/// 出力フォーマッター（Strategy Pattern）
///
/// 各出力フォーマット（Markdown, JSON, CSV）をenumとして表現します。
#[derive(Debug, Clone, Copy)]
pub enum OutputFormatter {
    Markdown,
    Json,
    Csv,
}

impl OutputFormatter {
    /// 出力フォーマットからフォーマッターを生成
    pub fn from_format(format: crate::api::OutputFormat) -> Self {
        match format {
            crate::api::OutputFormat::Markdown => OutputFormatter::Markdown,
            crate::api::OutputFormat::Json => OutputFormatter::Json,
            crate::api::OutputFormat::Csv => OutputFormatter::Csv,
        }
    }

    /// プレビューを指定されたフォーマットで出力する
    ///
    /// # 引数
    ///
    /// * `preview` - 出力するプレビュー
    /// * `writer` - 出力先のライター
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - 出力に成功した場合
    /// * `Err(SheetMapError)` - エラーが発生した場合
    pub fn render<W: Write>(&self, preview: &Preview, writer: &mut W) -> Result<(), SheetMapError> {
        match self {
            OutputFormatter::Markdown => MarkdownFormatter.render(preview, writer),
            OutputFormatter::Json => JsonFormatter.render(preview, writer),
            OutputFormatter::Csv => CsvFormatter.render(preview, writer),
        }
    }
}

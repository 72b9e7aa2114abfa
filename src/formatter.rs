//! Formatter Module
//!
//! セル値のフォーマット処理と、書き込み時の値変換を提供するモジュール。

use calamine::Data;
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::SheetMapError;
use crate::grid::CellValue;

/// Excelの日付として扱うシリアル値の上限（9999-12-31の翌日）
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

/// 価格から除去する文字（通貨記号・桁区切り・空白）
const PRICE_NOISE: &[char] = &[',', '$', '€', '¥', '£', ' ', '\u{a0}'];

/// セルフォーマッター
///
/// calamineのセル値を、ソーステーブル用の文字列とテンプレートグリッド用の
/// `CellValue`に変換するファサードとして機能します。
#[derive(Debug, Default)]
pub(crate) struct CellFormatter {
    /// 日付フォーマッター
    date_formatter: DateFormatter,

    /// 数値フォーマッター
    number_formatter: NumberFormatter,
}

impl CellFormatter {
    /// 新しいCellFormatterインスタンスを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// セル値を文字列にフォーマット
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - フォーマット済み文字列（空セルは空文字列）
    /// * `Err(SheetMapError)` - 日付の計算に失敗した場合
    pub fn format_data(&self, data: &Data) -> Result<String, SheetMapError> {
        let formatted = match data {
            Data::Int(i) => i.to_string(),
            Data::Float(f) => self.number_formatter.format(*f),
            Data::String(s) => s.clone(),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Data::DateTime(dt) => self.date_formatter.format(dt.as_f64())?,
            Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
            Data::Error(e) => format!("#{:?}", e),
            Data::Empty => String::new(),
        };
        Ok(formatted)
    }

    /// セル値をテンプレートグリッドの値に変換
    ///
    /// 数値はそのまま数値として保持し、それ以外は文字列にフォーマットします。
    pub fn to_cell_value(&self, data: &Data) -> Result<CellValue, SheetMapError> {
        let value = match data {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Empty => CellValue::Empty,
            other => CellValue::from_text(self.format_data(other)?),
        };
        Ok(value)
    }
}

/// 日付フォーマッター
///
/// Excelのシリアル日付値を文字列に変換します。
///
/// # エポックシステム
///
/// 1900年システム: 1899年12月30日起算（Excelの1900年うるう年バグにより、
/// 1900年3月1日以降の日付で実際の暦と一致します）
#[derive(Debug, Default)]
pub(crate) struct DateFormatter;

impl DateFormatter {
    /// 日付値をフォーマット
    ///
    /// 時刻部分が0の場合は`%Y-%m-%d`、それ以外は`%Y-%m-%d %H:%M:%S`で出力します。
    /// 日付として扱えない範囲の値は数値としてフォーマットします。
    pub fn format(&self, serial_value: f64) -> Result<String, SheetMapError> {
        if !(0.0..MAX_EXCEL_SERIAL).contains(&serial_value) {
            return Ok(NumberFormatter.format(serial_value));
        }

        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| SheetMapError::Config("Invalid epoch date".to_string()))?;

        let millis = (serial_value * 86_400_000.0).round() as i64;
        let datetime: NaiveDateTime = epoch
            .checked_add_signed(Duration::milliseconds(millis))
            .ok_or_else(|| {
                SheetMapError::Config(format!(
                    "Date calculation overflow: serial_value={}",
                    serial_value
                ))
            })?;

        let formatted = if millis % 86_400_000 == 0 {
            datetime.format("%Y-%m-%d").to_string()
        } else {
            datetime.format("%Y-%m-%d %H:%M:%S").to_string()
        };
        Ok(formatted)
    }
}

/// 数値フォーマッター
///
/// 整数値は小数点なしで出力します（`100.0` → `"100"`）。
#[derive(Debug, Default)]
pub(crate) struct NumberFormatter;

impl NumberFormatter {
    pub fn format(&self, value: f64) -> String {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            value.to_string()
        }
    }
}

/// 価格文字列を数値に変換する
///
/// 通貨記号（`$ € ¥ £`）、桁区切りのカンマ、空白、ノーブレークスペースを除去してから
/// 小数として解析します。解析できない場合は`None`を返します。
///
/// # 使用例
///
/// ```rust
/// use sheetmap::coerce_price;
///
/// assert_eq!(coerce_price("$ 1,234.50"), Some(1234.5));
/// assert_eq!(coerce_price("consultar"), None);
/// ```
pub fn coerce_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| !PRICE_NOISE.contains(c)).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 論理フィールド
///
/// ソース列とテンプレート列の両方が最終的に分類される、固定の商品属性語彙です。
/// マッピングの値域として使用されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalField {
    Title,
    Price,
    Stock,
    Sku,
    Images,
    Description,
    Condition,
    Shipping,
    Category,
    Brand,
    Model,
    Weight,
    Dimensions,
    Warranty,
    Currency,
}

impl LogicalField {
    /// すべての論理フィールド（宣言順）
    pub const ALL: [LogicalField; 15] = [
        LogicalField::Title,
        LogicalField::Price,
        LogicalField::Stock,
        LogicalField::Sku,
        LogicalField::Images,
        LogicalField::Description,
        LogicalField::Condition,
        LogicalField::Shipping,
        LogicalField::Category,
        LogicalField::Brand,
        LogicalField::Model,
        LogicalField::Weight,
        LogicalField::Dimensions,
        LogicalField::Warranty,
        LogicalField::Currency,
    ];

    /// ワイヤー形式のキー（例: `"title"`）
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::Title => "title",
            LogicalField::Price => "price",
            LogicalField::Stock => "stock",
            LogicalField::Sku => "sku",
            LogicalField::Images => "images",
            LogicalField::Description => "description",
            LogicalField::Condition => "condition",
            LogicalField::Shipping => "shipping",
            LogicalField::Category => "category",
            LogicalField::Brand => "brand",
            LogicalField::Model => "model",
            LogicalField::Weight => "weight",
            LogicalField::Dimensions => "dimensions",
            LogicalField::Warranty => "warranty",
            LogicalField::Currency => "currency",
        }
    }

    /// このフィールドの値に適用する変換ルール名
    pub fn transformation_rule(&self) -> Option<&'static str> {
        match self {
            LogicalField::Price => Some("coerce_price"),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalField {
    type Err = String;

    /// ワイヤー形式のキーから論理フィールドを解決する（大文字小文字は区別しない）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        LogicalField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| format!("unknown logical field '{}'", s))
    }
}

/// 正規化済みヘッダートークン
///
/// `normalize()`によってのみ生成されます。同じトークンを持つ2つのヘッダーは
/// 分類上は同一とみなされます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NormalizedToken(pub(crate) String);

impl NormalizedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 自動マッピングの信頼度（3段階）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// テンプレート解析の検出信頼度（0.0〜1.0）を3段階に変換
    ///
    /// 0.8以上は`High`、0.6以上は`Medium`、それ未満は`Low`。
    pub fn from_detection_score(score: f32) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.6 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// マッピングの由来
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "confidence", rename_all = "snake_case")]
pub enum MappingOrigin {
    /// `AutoMapper`が導出したマッピング
    Auto(Confidence),

    /// ユーザーが手動で確定したマッピング（信頼度スケールの対象外）
    UserConfirmed,
}

/// `AutoMapper`/`RemapResolver`が生成するマッピングエントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// ソース列名
    pub source_column: String,

    /// 対象フィールド（テンプレートのラベル、またはラベルがない場合は論理フィールドのキー）
    pub target_field: String,

    /// 対象の論理フィールド
    pub logical_field: LogicalField,

    /// マッピングの由来
    pub origin: MappingOrigin,

    /// 値に適用する変換ルール
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation_rule: Option<String>,
}

impl MappingEntry {
    /// 自動マッピングの場合は信頼度を返す
    pub fn confidence(&self) -> Option<Confidence> {
        match self.origin {
            MappingOrigin::Auto(c) => Some(c),
            MappingOrigin::UserConfirmed => None,
        }
    }
}

/// 保留中のセル編集
///
/// `(row, logical_field)`で一意にキー付けされます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    /// プレビューの行番号（1始まり、データ開始行以上）
    pub row: u32,

    /// 対象の論理フィールド
    #[serde(rename = "field")]
    pub logical_field: LogicalField,

    /// 値
    pub value: String,
}

/// テンプレート解析によって検出されたフィールド
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    /// 表示ラベル（例: `"Título"`）
    pub field_name: String,

    /// テンプレート上で検出されたテキスト
    pub detected_text: String,

    /// 列位置（0始まり）
    pub position: usize,

    /// 検出の信頼度（0.0〜1.0）
    pub confidence: f32,
}

impl TemplateField {
    /// 検出テキストと同じラベルを持つ、信頼度1.0のフィールドを生成
    pub fn new(field_name: impl Into<String>, position: usize) -> Self {
        let field_name = field_name.into();
        Self {
            detected_text: field_name.clone(),
            field_name,
            position,
            confidence: 1.0,
        }
    }
}

/// テンプレート解析によって検出されたカテゴリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedCategory {
    pub category_name: String,
    pub detected_text: String,
    pub position: usize,
    pub confidence: f32,
}

/// テンプレートのフィールドカタログ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    pub fields: Vec<TemplateField>,

    #[serde(default)]
    pub categories: Vec<DetectedCategory>,
}

impl TemplateCatalog {
    pub fn new(fields: Vec<TemplateField>) -> Self {
        Self {
            fields,
            categories: Vec::new(),
        }
    }

    /// ラベル一覧から信頼度1.0のカタログを生成（列位置は並び順）
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self::new(
            labels
                .iter()
                .enumerate()
                .map(|(i, l)| TemplateField::new(l.as_ref(), i))
                .collect(),
        )
    }
}

/// ソースデータ（ヘッダーと行）
///
/// 同じテキストのヘッダーが複数あっても別の列位置として扱いますが、
/// 列名による参照は最初に出現した列に解決されます。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SourceTable {
    /// ヘッダーと行から生成する
    ///
    /// 行の長さがヘッダー数と異なる場合は、空文字列で補うか切り詰めます。
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// ヘッダーをキーとした行オブジェクトの列から生成する
    pub fn from_records(
        headers: Vec<String>,
        records: &[std::collections::HashMap<String, String>],
    ) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 列名から列インデックスを取得（最初に一致した列）
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// 指定行・列名の値を取得
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// テンプレートへの書き込みモード
///
/// 既にデータを保持しているテンプレートセルを`TemplateWriter`がどう扱うかを指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// 空のセルにのみ書き込む（デフォルト）
    ///
    /// 値が入っているセルは上書きしません。元のテンプレートに対して
    /// 何度実行しても同じ結果になります。
    #[default]
    FillEmpty,

    /// 最後に値が入っている行の次から全ソース行を追記する
    ///
    /// 既存のテンプレート行には触れません。編集はプレビューの行番号で参照され、
    /// 追記先の行がずれても対応するソース行とともに書き込まれます。
    Append,

    /// 編集で指定された行のみを書き込む
    ///
    /// 編集ペイロードが必須です。編集がある行では、編集したセルだけでなく
    /// マッピング済みのすべての列を、編集・ソース・既定値の優先順位で解決した値で
    /// 上書きします。マッピングも編集もない列と、論理フィールドに分類できない列には
    /// 触れません。
    Interactive,

    /// すべての行のマッピング済みセルを無条件に上書きする
    ///
    /// 破壊的な操作です。呼び出し側でバックアップを取る必要があり、
    /// ライター自身はバックアップを作成しません。
    Overwrite,
}

impl WriteMode {
    /// ワイヤー形式の名前（例: `"fill-empty"`）
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::FillEmpty => "fill-empty",
            WriteMode::Append => "append",
            WriteMode::Interactive => "interactive",
            WriteMode::Overwrite => "overwrite",
        }
    }

    /// 既に値が入っているセルを上書きできるかどうか
    pub fn may_overwrite(&self) -> bool {
        matches!(self, WriteMode::Interactive | WriteMode::Overwrite)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "fill-empty" => Ok(WriteMode::FillEmpty),
            "append" => Ok(WriteMode::Append),
            "interactive" => Ok(WriteMode::Interactive),
            "overwrite" => Ok(WriteMode::Overwrite),
            other => Err(format!("invalid write_mode '{}'", other)),
        }
    }
}

/// プレビューの出力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputFormat {
    /// Markdown形式（デフォルト）
    ///
    /// # 出力例
    ///
    /// ```markdown
    /// | Fila | Título  | Precio |
    /// | ---- | ------- | ------ |
    /// | 8    | Zapato  | 100    |
    /// ```
    Markdown,

    /// JSON形式
    ///
    /// `Preview`をそのままシリアライズします。
    Json,

    /// CSV形式
    ///
    /// 1行目にテンプレートのラベル、以降にプレビュー行を出力します。
    Csv,
}

/// シート選択方式
///
/// ワークブックから読み込むシートを選択する方法を指定します。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SheetSelector {
    /// インデックス指定（0始まり）
    ///
    /// 例: `SheetSelector::Index(0)` は最初のシートを選択
    Index(usize),

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Plantilla".to_string())`
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// 成果物のファイル名の付け方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ArtifactNaming {
    /// 書き込み後のグリッド内容のSHA-256ダイジェストから命名（デフォルト）
    ///
    /// 例: `ml_productos_mapeados_3f2a9c01d4e5b6a7.xlsx`
    ///
    /// 同じ入力からは常に同じファイル名が生成されます。
    #[default]
    ContentAddressed,

    /// 生成時刻から命名
    ///
    /// 例: `ml_productos_mapeados_20251120_142530.xlsx`
    Timestamped,
}

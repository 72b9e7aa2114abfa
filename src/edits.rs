//! Edit Stage Module
//!
//! 保留中のセル編集（行 × 論理フィールド → 値）を保持するオーバーレイと、
//! 編集ペイロード（JSON配列）の解析を行うモジュール。
//!
//! 分類できないヘッダーを参照する編集は隔離領域に保持され、
//! `RemapResolver`で解決されるまで確定済みの編集には含まれません。

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::RuleTable;
use crate::error::SheetMapError;
use crate::grid::MAX_ROWS;
use crate::mapping::FieldMapping;
use crate::types::{LogicalField, PendingEdit};

/// 編集ペイロードの1要素（未検証）
///
/// `field`は通常は論理フィールドのキーですが、マッピング済みのソース列名や
/// 分類可能なヘッダーも受け付けます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditItem {
    pub row: i64,
    pub field: String,
    pub value: String,
}

/// 隔離中の編集
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedEdit {
    pub row: u32,
    /// 編集が参照した元のヘッダー
    pub header: String,
    pub value: String,
}

/// `set_by_header`の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPlacement {
    /// ヘッダーが分類でき、確定済みの編集として保存された
    Confirmed(LogicalField),

    /// ヘッダーが分類できず、隔離された
    Quarantined,
}

/// 保留中の編集のステージ
///
/// 同じ`(row, logical_field)`への`set`は後勝ちで上書きされ、履歴は保持しません。
///
/// # 使用例
///
/// ```rust
/// use sheetmap::{EditStage, LogicalField};
///
/// let mut stage = EditStage::new(8);
/// stage.set(9, LogicalField::Price, "10").unwrap();
/// stage.set(9, LogicalField::Price, "20").unwrap();
/// assert_eq!(stage.get(9, LogicalField::Price), Some("20"));
/// assert!(stage.set(3, LogicalField::Price, "5").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditStage {
    first_data_row: u32,
    max_batch: usize,
    confirmed: BTreeMap<(u32, LogicalField), String>,
    quarantine: BTreeMap<(u32, String), String>,
}

impl EditStage {
    /// 空のステージを生成する
    ///
    /// # 引数
    ///
    /// * `first_data_row` - 最初のデータ行（1始まり）。これより上の行への編集は拒否されます。
    pub fn new(first_data_row: u32) -> Self {
        Self {
            first_data_row,
            max_batch: usize::MAX,
            confirmed: BTreeMap::new(),
            quarantine: BTreeMap::new(),
        }
    }

    /// 1回のバッチで受け付ける編集数の上限を設定する
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    pub fn first_data_row(&self) -> u32 {
        self.first_data_row
    }

    /// 行がデータ開始行からワークシートの最終行までの範囲にあるか検証する
    fn check_row(&self, row: i64) -> Result<u32, SheetMapError> {
        if row < i64::from(self.first_data_row) || row > i64::from(MAX_ROWS) {
            return Err(SheetMapError::RowOutOfRange {
                row,
                min: self.first_data_row,
                max: MAX_ROWS,
            });
        }
        Ok(row as u32)
    }

    /// 編集を設定する（同じキーの既存の編集は置き換える）
    ///
    /// # 戻り値
    ///
    /// 置き換えられた以前の値
    pub fn set(
        &mut self,
        row: u32,
        field: LogicalField,
        value: impl Into<String>,
    ) -> Result<Option<String>, SheetMapError> {
        let row = self.check_row(i64::from(row))?;
        Ok(self.confirmed.insert((row, field), value.into()))
    }

    pub fn get(&self, row: u32, field: LogicalField) -> Option<&str> {
        self.confirmed.get(&(row, field)).map(|s| s.as_str())
    }

    pub fn remove(&mut self, row: u32, field: LogicalField) -> Option<String> {
        self.confirmed.remove(&(row, field))
    }

    /// 確定済み・隔離中のすべての編集を破棄する
    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.quarantine.clear();
    }

    /// 確定済みの編集数
    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    /// 確定済みの編集がないかどうか
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    /// 確定済みの編集を`(row, field)`順に返す
    ///
    /// 隔離中の編集は含みません。
    pub fn to_payload(&self) -> Vec<PendingEdit> {
        self.confirmed
            .iter()
            .map(|((row, field), value)| PendingEdit {
                row: *row,
                logical_field: *field,
                value: value.clone(),
            })
            .collect()
    }

    /// 編集が存在する行（昇順、重複なし）
    pub fn rows(&self) -> BTreeSet<u32> {
        self.confirmed.keys().map(|(row, _)| *row).collect()
    }

    /// 指定行の確定済みの編集
    pub fn row_edits(&self, row: u32) -> impl Iterator<Item = (LogicalField, &str)> {
        self.confirmed
            .range((row, LogicalField::ALL[0])..)
            .take_while(move |((r, _), _)| *r == row)
            .map(|((_, f), v)| (*f, v.as_str()))
    }

    /// 生のヘッダーを指定して編集を設定する
    ///
    /// ヘッダーが分類できる場合は確定済みの編集として、できない場合は
    /// 元のヘッダーをキーにして隔離領域に保存します。
    pub fn set_by_header(
        &mut self,
        row: u32,
        header: &str,
        value: impl Into<String>,
        table: &RuleTable,
    ) -> Result<EditPlacement, SheetMapError> {
        let row = self.check_row(i64::from(row))?;
        match table.classify_header(header) {
            Some(field) => {
                self.confirmed.insert((row, field), value.into());
                Ok(EditPlacement::Confirmed(field))
            }
            None => {
                tracing::debug!(row, header, "quarantined edit for unclassified header");
                self.quarantine
                    .insert((row, header.to_string()), value.into());
                Ok(EditPlacement::Quarantined)
            }
        }
    }

    /// 隔離中の編集
    pub fn quarantined(&self) -> Vec<QuarantinedEdit> {
        self.quarantine
            .iter()
            .map(|((row, header), value)| QuarantinedEdit {
                row: *row,
                header: header.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// 隔離中の編集が参照しているヘッダー（重複なし）
    pub fn unresolved_headers(&self) -> Vec<String> {
        self.quarantine
            .keys()
            .map(|(_, header)| header.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 解決されたヘッダーの隔離中の編集を確定済みに移す
    ///
    /// 同じキーの確定済みの編集がある場合は上書きします。移した件数を返します。
    pub(crate) fn migrate_quarantined(&mut self, header: &str, field: LogicalField) -> usize {
        let keys: Vec<(u32, String)> = self
            .quarantine
            .keys()
            .filter(|(_, h)| h == header)
            .cloned()
            .collect();

        for key in &keys {
            if let Some(value) = self.quarantine.remove(key) {
                self.confirmed.insert((key.0, field), value);
            }
        }
        keys.len()
    }

    /// 編集バッチを全件適用する（all-or-nothing）
    ///
    /// すべての要素を先に検証し、1件でも不正な要素があればステージを変更せずに
    /// エラーを返します。`field`は論理フィールドのキー、マッピング済みのソース列名、
    /// 分類可能なヘッダーの順に解決します。
    ///
    /// # 戻り値
    ///
    /// * `Ok(usize)` - 適用した編集数
    /// * `Err(SheetMapError::RowOutOfRange)` - 最初のデータ行より上、またはワークシートの最終行より下の行を参照している場合
    /// * `Err(SheetMapError::MalformedEditsPayload)` - フィールドが解決できない場合
    /// * `Err(SheetMapError::SecurityViolation)` - バッチが上限を超える場合
    pub fn apply_batch(
        &mut self,
        items: &[EditItem],
        mapping: &FieldMapping,
        table: &RuleTable,
    ) -> Result<usize, SheetMapError> {
        let resolved = self.validate_batch(items, mapping, table)?;
        let count = resolved.len();
        for (key, value) in resolved {
            self.confirmed.insert(key, value);
        }
        Ok(count)
    }

    /// バッチを検証し、適用可能な形に解決する（ステージは変更しない）
    pub fn validate_batch(
        &self,
        items: &[EditItem],
        mapping: &FieldMapping,
        table: &RuleTable,
    ) -> Result<Vec<((u32, LogicalField), String)>, SheetMapError> {
        if items.len() > self.max_batch {
            return Err(SheetMapError::SecurityViolation(format!(
                "Edit batch of {} items exceeds the limit of {}",
                items.len(),
                self.max_batch
            )));
        }

        items
            .iter()
            .map(|item| {
                let row = self.check_row(item.row)?;
                let field = resolve_edit_field(&item.field, mapping, table)?;
                Ok(((row, field), item.value.clone()))
            })
            .collect()
    }
}

fn resolve_edit_field(
    field: &str,
    mapping: &FieldMapping,
    table: &RuleTable,
) -> Result<LogicalField, SheetMapError> {
    LogicalField::from_str(field)
        .ok()
        .or_else(|| mapping.field_for_source_column(field))
        .or_else(|| table.classify_header(field))
        .ok_or_else(|| {
            SheetMapError::MalformedEditsPayload(format!(
                "field '{}' is not a logical field and has no resolved mapping",
                field
            ))
        })
}

/// 編集ペイロード（JSON文字列）を解析する
///
/// 形式は`[{"row": 9, "field": "price", "value": "150"}, ...]`です。
/// `value`は文字列・数値・真偽値を受け付け、`null`は空文字列として扱います。
///
/// # 使用例
///
/// ```rust
/// use sheetmap::parse_edits_json;
///
/// let items = parse_edits_json(r#"[{"row": 9, "field": "price", "value": 150}]"#).unwrap();
/// assert_eq!(items[0].value, "150");
/// assert!(parse_edits_json("{not json").is_err());
/// ```
pub fn parse_edits_json(json: &str) -> Result<Vec<EditItem>, SheetMapError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SheetMapError::MalformedEditsPayload(format!("invalid JSON: {}", e)))?;
    parse_edits_value(&value)
}

/// 編集ペイロード（JSON値）を解析する
pub fn parse_edits_value(value: &Value) -> Result<Vec<EditItem>, SheetMapError> {
    let Value::Array(items) = value else {
        return Err(SheetMapError::MalformedEditsPayload(
            "edits payload must be a JSON array".to_string(),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_edit_item(index, item))
        .collect()
}

fn parse_edit_item(index: usize, item: &Value) -> Result<EditItem, SheetMapError> {
    let malformed =
        |msg: &str| SheetMapError::MalformedEditsPayload(format!("edit #{}: {}", index, msg));

    let Value::Object(object) = item else {
        return Err(malformed("must be an object"));
    };

    let row = object
        .get("row")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("'row' must be an integer"))?;

    let field = object
        .get("field")
        .and_then(Value::as_str)
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| malformed("'field' must be a non-empty string"))?;

    let value = match object.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(_) => return Err(malformed("'value' must be a string, number or boolean")),
    };

    Ok(EditItem {
        row,
        field: field.to_string(),
        value,
    })
}

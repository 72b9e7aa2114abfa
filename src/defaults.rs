//! Default Settings Module
//!
//! 行ごとにマッピング値・編集値がない場合に使用される既定値の設定。
//! 設定ウィザードのJSON形式をそのままデシリアライズできます。

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::classify::RuleTable;
use crate::types::LogicalField;

/// 在庫の既定値（設定が与えられていて`default_stock`がない場合）
const FALLBACK_STOCK: &str = "1";

/// 任意のキー/値の既定値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDefault {
    /// 論理フィールドのキー、またはテンプレートのラベル
    pub field: String,

    #[serde(deserialize_with = "lenient_string")]
    pub value: String,
}

/// 既定値の設定
///
/// # 使用例
///
/// ```rust
/// use sheetmap::{DefaultSettings, LogicalField};
///
/// let settings: DefaultSettings = serde_json::from_str(
///     r#"{"condition": "used", "free_shipping": "yes", "default_stock": 3}"#,
/// ).unwrap();
///
/// assert_eq!(settings.value_for(LogicalField::Condition).as_deref(), Some("Usado"));
/// assert_eq!(settings.value_for(LogicalField::Shipping).as_deref(), Some("me2"));
/// assert_eq!(settings.value_for(LogicalField::Stock).as_deref(), Some("3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultSettings {
    /// 商品の状態（`new` / `used` / `refurbished`）
    #[serde(deserialize_with = "lenient_opt_string")]
    pub condition: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub currency: Option<String>,

    /// 送料無料（`yes`の場合は配送方法`me2`を既定値にする）
    #[serde(deserialize_with = "lenient_opt_string")]
    pub free_shipping: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub accepts_mercado_pago: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub pickup_allowed: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub flex_shipping: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub listing_type: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub brand: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub warranty: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub default_description: Option<String>,

    #[serde(deserialize_with = "lenient_opt_string")]
    pub default_stock: Option<String>,

    pub custom_defaults: Vec<CustomDefault>,
}

impl DefaultSettings {
    /// 設定項目が1つもないかどうか
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 論理フィールドの既定値
    ///
    /// 論理フィールドのキーまたは分類可能なラベルを持つ`custom_defaults`が
    /// 組み込みの既定値より優先されます。
    pub fn value_for(&self, field: LogicalField) -> Option<String> {
        self.value_for_with(field, RuleTable::default_rules())
    }

    /// 指定したルール表で`custom_defaults`のキーを解決する`value_for`
    pub fn value_for_with(&self, field: LogicalField, table: &RuleTable) -> Option<String> {
        let custom = self
            .custom_defaults
            .iter()
            .rev()
            .find(|c| custom_field(&c.field, table) == Some(field))
            .map(|c| c.value.clone());

        custom.or_else(|| self.builtin(field))
    }

    /// 論理フィールドに分類できないテンプレートラベルに対する既定値
    ///
    /// ラベルは完全一致で比較します。
    pub fn value_for_label(&self, label: &str) -> Option<&str> {
        self.custom_defaults
            .iter()
            .rev()
            .find(|c| c.field == label)
            .map(|c| c.value.as_str())
    }

    fn builtin(&self, field: LogicalField) -> Option<String> {
        match field {
            LogicalField::Condition => self.condition.as_deref().map(|c| {
                match c.trim().to_ascii_lowercase().as_str() {
                    "used" => "Usado",
                    "refurbished" => "Reacondicionado",
                    _ => "Nuevo",
                }
                .to_string()
            }),
            LogicalField::Shipping => self
                .free_shipping
                .as_deref()
                .filter(|v| is_affirmative(v))
                .map(|_| "me2".to_string()),
            LogicalField::Stock => match &self.default_stock {
                Some(stock) => Some(stock.clone()),
                None if !self.is_empty() => Some(FALLBACK_STOCK.to_string()),
                None => None,
            },
            LogicalField::Currency => self.currency.clone(),
            LogicalField::Brand => self.brand.clone(),
            LogicalField::Warranty => self.warranty.clone(),
            LogicalField::Description => self.default_description.clone(),
            _ => None,
        }
        .filter(|v| !v.is_empty())
    }
}

fn custom_field(key: &str, table: &RuleTable) -> Option<LogicalField> {
    LogicalField::from_str(key)
        .ok()
        .or_else(|| table.classify_header(key))
}

fn is_affirmative(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "si" | "sí" | "1"
    )
}

/// 文字列・数値・真偽値を文字列として受け付ける
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(if b { "yes" } else { "no" }.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string, number or boolean, got {}",
            other
        ))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_opt_string(deserializer).map(Option::unwrap_or_default)
}

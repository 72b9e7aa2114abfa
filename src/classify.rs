//! Logical Field Classifier Module
//!
//! 正規化済みヘッダーを論理フィールドに分類するモジュール。
//!
//! 分類はコードではなくデータとして表現された、順序付きのルール表で行います。
//! 各ルールは(単語境界付きパターン, 論理フィールド)の組で、上から順に評価され、
//! 最初に一致したルールが採用されます。

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SheetMapError;
use crate::normalize::normalize;
use crate::types::{LogicalField, NormalizedToken};

/// 既定のルール表
///
/// 後続ルールの単語を含むフレーズ（例: `"id producto"`は`title`の`"producto"`を含む）は、
/// 覆い隠されないよう先頭に専用のルールとして置いています。
const DEFAULT_RULES: &[(LogicalField, &[&str])] = &[
    (LogicalField::Sku, &["id producto"]),
    (LogicalField::Condition, &["condicion del producto"]),
    (
        LogicalField::Title,
        &[
            "titulo",
            "title",
            "nombre",
            "name",
            "producto",
            "item name",
            "nombre producto",
        ],
    ),
    (
        LogicalField::Price,
        &[
            "precio",
            "price",
            "valor",
            "costo",
            "cost",
            "amount",
            "precio unitario",
            "precio final",
        ],
    ),
    (
        LogicalField::Currency,
        &["moneda", "currency", "ars", "usd", "brl"],
    ),
    (
        LogicalField::Stock,
        &[
            "stock",
            "cantidad",
            "qty",
            "quantity",
            "unidades",
            "existencia",
            "disponible",
        ],
    ),
    (
        LogicalField::Sku,
        &["sku", "codigo", "codigo sku", "cod", "ref", "referencia"],
    ),
    (
        LogicalField::Images,
        &[
            "imagen",
            "imagenes",
            "image",
            "images",
            "foto",
            "fotos",
            "picture",
            "pictures",
            "imagen principal",
            "url imagen",
        ],
    ),
    (
        LogicalField::Description,
        &["descripcion", "description", "detalle", "detalles", "desc"],
    ),
    (
        LogicalField::Condition,
        &["condicion", "condition", "estado"],
    ),
    (
        LogicalField::Shipping,
        &[
            "envio",
            "envio gratis",
            "shipping",
            "fulfillment",
            "fulfillment type",
        ],
    ),
    (
        LogicalField::Category,
        &["categoria", "categoria padre", "category", "cat"],
    ),
    (LogicalField::Brand, &["marca", "brand"]),
    (LogicalField::Model, &["modelo", "model"]),
    (LogicalField::Weight, &["peso", "weight"]),
    (
        LogicalField::Dimensions,
        &[
            "dimension",
            "dimensiones",
            "alto",
            "ancho",
            "largo",
            "dimensions",
        ],
    ),
    (LogicalField::Warranty, &["garantia", "warranty"]),
];

static DEFAULT_TABLE: LazyLock<RuleTable> = LazyLock::new(|| {
    RuleTable::compile(
        DEFAULT_RULES
            .iter()
            .map(|(field, phrases)| (*field, phrases.iter().map(|p| p.to_string()).collect())),
    )
    .expect("default classification rules compile")
});

/// 分類ルール
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    field: LogicalField,
    phrases: Vec<String>,
    // フレーズが空のルールは何にも一致しない
    pattern: Option<Regex>,
}

impl ClassificationRule {
    /// フレーズ群から単語境界付きのパターンを構築する
    fn new(field: LogicalField, phrases: Vec<String>) -> Result<Self, SheetMapError> {
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = if phrases.is_empty() {
            None
        } else {
            let pattern = Regex::new(&format!(r"\b(?:{})\b", alternation)).map_err(|e| {
                SheetMapError::Config(format!("Invalid rule for '{}': {}", field, e))
            })?;
            Some(pattern)
        };

        Ok(Self {
            field,
            phrases,
            pattern,
        })
    }

    pub fn field(&self) -> LogicalField {
        self.field
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    fn find<'t>(&self, token: &'t str) -> Option<&'t str> {
        self.pattern
            .as_ref()
            .and_then(|p| p.find(token))
            .map(|m| m.as_str())
    }
}

/// 分類結果の詳細
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// 分類された論理フィールド
    pub field: LogicalField,

    /// 一致したルールのインデックス
    pub rule_index: usize,

    /// 一致した語句
    pub matched: String,
}

/// 順序付きの分類ルール表
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<ClassificationRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

impl RuleTable {
    /// 既定のルール表への参照
    pub fn default_rules() -> &'static RuleTable {
        &DEFAULT_TABLE
    }

    /// 検証なしでルール表を構築する（内部用）
    fn compile<I>(entries: I) -> Result<Self, SheetMapError>
    where
        I: IntoIterator<Item = (LogicalField, Vec<String>)>,
    {
        let rules = entries
            .into_iter()
            .map(|(field, phrases)| ClassificationRule::new(field, phrases))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// ルール表を構築し、覆い隠しがないことを検証する
    ///
    /// # 戻り値
    ///
    /// * `Ok(RuleTable)` - 検証に成功した場合
    /// * `Err(SheetMapError::Config)` - フレーズが正規化されていない、空である、
    ///   または先行するルールに覆い隠される場合
    pub fn new<I>(entries: I) -> Result<Self, SheetMapError>
    where
        I: IntoIterator<Item = (LogicalField, Vec<String>)>,
    {
        let table = Self::compile(entries)?;
        table.validate()?;
        Ok(table)
    }

    /// 既定のルール表の末尾に追加ルールを連結し、検証する
    pub fn with_extra_rules(
        extra: &[(LogicalField, Vec<String>)],
    ) -> Result<Self, SheetMapError> {
        let mut entries: Vec<(LogicalField, Vec<String>)> = DEFAULT_TABLE
            .rules
            .iter()
            .map(|r| (r.field, r.phrases.clone()))
            .collect();
        entries.extend(extra.iter().cloned());
        Self::new(entries)
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// ルール表の整合性を検証する
    ///
    /// すべてのフレーズについて、
    /// 1. 空でないこと
    /// 2. 既に正規化済みの形であること
    /// 3. フレーズ自身を分類したとき、そのフレーズを宣言したルールと同じ論理フィールドに
    ///    分類されること（先行ルールによる意図しない覆い隠しがないこと）
    ///
    /// を確認します。
    pub fn validate(&self) -> Result<(), SheetMapError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.phrases.is_empty() {
                return Err(SheetMapError::Config(format!(
                    "Rule #{} for '{}' has no phrases",
                    index, rule.field
                )));
            }

            for phrase in &rule.phrases {
                if phrase.is_empty() {
                    return Err(SheetMapError::Config(format!(
                        "Rule #{} for '{}' contains an empty phrase",
                        index, rule.field
                    )));
                }

                let token = normalize(phrase);
                if token.as_str() != phrase {
                    return Err(SheetMapError::Config(format!(
                        "Phrase '{}' in rule #{} is not normalized (expected '{}')",
                        phrase, index, token
                    )));
                }

                match self.classify_detailed(&token) {
                    Some(hit) if hit.field == rule.field => {}
                    Some(hit) => {
                        return Err(SheetMapError::Config(format!(
                            "Phrase '{}' of rule #{} ('{}') is shadowed by rule #{} ('{}') matching '{}'",
                            phrase, index, rule.field, hit.rule_index, hit.field, hit.matched
                        )));
                    }
                    None => {
                        return Err(SheetMapError::Config(format!(
                            "Phrase '{}' of rule #{} does not match its own pattern",
                            phrase, index
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// 正規化済みトークンを分類する
    ///
    /// 一致するルールがない場合は`None`（分類不能）を返します。
    pub fn classify(&self, token: &NormalizedToken) -> Option<LogicalField> {
        self.classify_detailed(token).map(|c| c.field)
    }

    /// 正規化済みトークンを分類し、一致したルールの詳細を返す
    pub fn classify_detailed(&self, token: &NormalizedToken) -> Option<Classification> {
        if token.is_empty() {
            return None;
        }

        self.rules.iter().enumerate().find_map(|(rule_index, rule)| {
            rule.find(token.as_str()).map(|m| Classification {
                field: rule.field,
                rule_index,
                matched: m.to_string(),
            })
        })
    }

    /// 生のヘッダーを正規化してから分類する
    pub fn classify_header(&self, raw: &str) -> Option<LogicalField> {
        let result = self.classify(&normalize(raw));
        if result.is_none() {
            tracing::debug!(header = raw, "header did not match any classification rule");
        }
        result
    }

    /// ヘッダー群を分類済み・未分類に分割する
    pub fn partition<S: AsRef<str>>(&self, headers: &[S]) -> HeaderPartition {
        let mut partition = HeaderPartition::default();
        for header in headers {
            let header = header.as_ref();
            match self.classify_header(header) {
                Some(field) => partition.resolved.push((header.to_string(), field)),
                None => partition.unresolved.push(header.to_string()),
            }
        }
        partition
    }
}

/// 既定のルール表で正規化済みトークンを分類する
///
/// # 使用例
///
/// ```rust
/// use sheetmap::{classify, normalize, LogicalField};
///
/// assert_eq!(classify(&normalize("Precio Unitario")), Some(LogicalField::Price));
/// assert_eq!(classify(&normalize("Notas internas")), None);
/// ```
pub fn classify(token: &NormalizedToken) -> Option<LogicalField> {
    DEFAULT_TABLE.classify(token)
}

/// ヘッダー群の分類結果（分類済み・未分類）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderPartition {
    /// 分類できたヘッダー（元の順序）
    pub resolved: Vec<(String, LogicalField)>,

    /// 分類できなかったヘッダー（元の順序）
    pub unresolved: Vec<String>,
}

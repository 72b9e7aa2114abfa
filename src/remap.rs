//! Remap Resolver Module
//!
//! 分類できなかったヘッダーに対するユーザーの手動割り当てを受け付け、
//! マッピングと隔離中の編集に統合するモジュール。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edits::EditStage;
use crate::error::SheetMapError;
use crate::mapping::FieldMapping;
use crate::types::{LogicalField, MappingEntry, MappingOrigin};

/// ユーザーの選択（生のヘッダー → 論理フィールド、`None`は「この列を無視」）
pub type RemapChoices = BTreeMap<String, Option<LogicalField>>;

/// 未解決ヘッダーの再マッピング要求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapRequest {
    pub unknown_headers: Vec<String>,
}

/// 再マッピング要求への応答（生のヘッダー → 論理フィールドのキー、空文字列は無視）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapResponse {
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

impl RemapResponse {
    /// 論理フィールドの選択に変換する
    ///
    /// 空文字列は`None`（無視）になります。論理フィールドのキーでない値は
    /// `UnknownMappingTarget`として拒否します。
    pub fn into_choices(self) -> Result<RemapChoices, SheetMapError> {
        self.mapping
            .into_iter()
            .map(|(header, key)| {
                if key.trim().is_empty() {
                    return Ok((header, None));
                }
                key.parse::<LogicalField>()
                    .map(|field| (header, Some(field)))
                    .map_err(|_| SheetMapError::UnknownMappingTarget(key))
            })
            .collect()
    }
}

/// 再マッピングの適用結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapOutcome {
    /// 確定したマッピングエントリ
    pub entries: Vec<MappingEntry>,

    /// 隔離領域から確定済みに移した編集数
    pub migrated_edits: usize,

    /// ユーザーが無視を選んだヘッダー
    pub ignored: Vec<String>,
}

/// 未分類ヘッダーの手動割り当てを解決する
///
/// 未分類ヘッダーに含まれない選択は無視されます。
///
/// # 戻り値
///
/// * `Ok(Vec<MappingEntry>)` - 未分類ヘッダーの順序で、空でない選択ごとのエントリ
/// * `Err(SheetMapError::AmbiguousRemap)` - 空でない選択が1つもない場合
///
/// # 使用例
///
/// ```rust
/// use sheetmap::{resolve, LogicalField, RemapChoices, SheetMapError};
///
/// let mut choices = RemapChoices::new();
/// choices.insert("Col X".to_string(), None);
/// assert!(matches!(
///     resolve(&["Col X"], &choices),
///     Err(SheetMapError::AmbiguousRemap)
/// ));
///
/// choices.insert("Col X".to_string(), Some(LogicalField::Sku));
/// let entries = resolve(&["Col X"], &choices).unwrap();
/// assert_eq!(entries[0].logical_field, LogicalField::Sku);
/// ```
pub fn resolve<S: AsRef<str>>(
    unknown_headers: &[S],
    choices: &RemapChoices,
) -> Result<Vec<MappingEntry>, SheetMapError> {
    let entries: Vec<MappingEntry> = unknown_headers
        .iter()
        .filter_map(|header| {
            let header = header.as_ref();
            let field = choices.get(header).copied().flatten()?;
            Some(MappingEntry {
                source_column: header.to_string(),
                target_field: field.as_str().to_string(),
                logical_field: field,
                origin: MappingOrigin::UserConfirmed,
                transformation_rule: field.transformation_rule().map(str::to_string),
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(SheetMapError::AmbiguousRemap);
    }
    Ok(entries)
}

/// 再マッピングのリゾルバー
///
/// 未分類ヘッダーの一覧を保持し、ユーザーの選択が適用されるまで開いた状態を保ちます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapResolver {
    unknown_headers: Vec<String>,
    open: bool,
}

impl RemapResolver {
    /// 未分類ヘッダーからリゾルバーを生成する（重複は除去、順序は維持）
    pub fn new<S: AsRef<str>>(unknown_headers: &[S]) -> Self {
        let mut headers: Vec<String> = Vec::with_capacity(unknown_headers.len());
        for header in unknown_headers {
            let header = header.as_ref();
            if !headers.iter().any(|h| h == header) {
                headers.push(header.to_string());
            }
        }
        let open = !headers.is_empty();
        Self {
            unknown_headers: headers,
            open,
        }
    }

    pub fn unknown_headers(&self) -> &[String] {
        &self.unknown_headers
    }

    /// ユーザーの選択を待っているかどうか
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// ワイヤー形式の要求
    pub fn request(&self) -> RemapRequest {
        RemapRequest {
            unknown_headers: self.unknown_headers.clone(),
        }
    }

    /// 選択を解決する（状態は変更しない）
    pub fn resolve(&self, choices: &RemapChoices) -> Result<Vec<MappingEntry>, SheetMapError> {
        resolve(&self.unknown_headers, choices)
    }

    /// 選択を解決し、マッピングと隔離中の編集に統合する
    ///
    /// 検証に失敗した場合はマッピング・ステージともに変更せず、リゾルバーも開いたままです。
    /// 成功した場合、解決されたヘッダーを参照していた隔離中の編集は解決された
    /// 論理フィールドのキーに書き換えられ、確定済みの編集に統合されます。
    /// 解決されなかったヘッダーの編集は隔離されたまま残ります。
    pub fn apply(
        &mut self,
        choices: &RemapChoices,
        mapping: &mut FieldMapping,
        stage: &mut EditStage,
    ) -> Result<RemapOutcome, SheetMapError> {
        let entries = self.resolve(choices)?;

        mapping.merge(&entries);
        let migrated_edits: usize = entries
            .iter()
            .map(|e| stage.migrate_quarantined(&e.source_column, e.logical_field))
            .sum();

        let ignored: Vec<String> = self
            .unknown_headers
            .iter()
            .filter(|h| !entries.iter().any(|e| &e.source_column == *h))
            .cloned()
            .collect();

        tracing::info!(
            resolved = entries.len(),
            ignored = ignored.len(),
            migrated_edits,
            "applied remap"
        );

        self.open = false;
        Ok(RemapOutcome {
            entries,
            migrated_edits,
            ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RuleTable;

    fn choices(pairs: &[(&str, Option<LogicalField>)]) -> RemapChoices {
        pairs.iter().map(|(h, f)| (h.to_string(), *f)).collect()
    }

    #[test]
    fn test_all_empty_choices_are_rejected() {
        let mut resolver = RemapResolver::new(&["Col X"]);
        let mut mapping = FieldMapping::new();
        let mut stage = EditStage::new(8);

        let result = resolver.apply(
            &choices(&[("Col X", None)]),
            &mut mapping,
            &mut stage,
        );
        assert!(matches!(result, Err(SheetMapError::AmbiguousRemap)));
        assert!(mapping.is_empty());
        assert!(resolver.is_open());
    }

    #[test]
    fn test_choices_for_unknown_headers_only() {
        let entries = resolve(
            &["Col X"],
            &choices(&[("Col X", Some(LogicalField::Sku)), ("Other", Some(LogicalField::Brand))]),
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, MappingOrigin::UserConfirmed);
        assert_eq!(entries[0].target_field, "sku");

        // 未分類ヘッダー以外の選択だけでは確定できない
        let result = resolve(&["Col X"], &choices(&[("Other", Some(LogicalField::Brand))]));
        assert!(matches!(result, Err(SheetMapError::AmbiguousRemap)));
    }

    #[test]
    fn test_apply_merges_mapping_and_migrates_edits() {
        let table = RuleTable::default_rules();
        let mut resolver = RemapResolver::new(&["Interno", "Notas"]);
        let mut mapping = FieldMapping::new();
        mapping.assign(LogicalField::Title, "Nombre", MappingOrigin::UserConfirmed);

        let mut stage = EditStage::new(8);
        stage.set_by_header(8, "Interno", "A-1", table).unwrap();
        stage.set_by_header(9, "Notas", "ver", table).unwrap();

        let outcome = resolver
            .apply(
                &choices(&[("Interno", Some(LogicalField::Sku)), ("Notas", None)]),
                &mut mapping,
                &mut stage,
            )
            .unwrap();

        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.migrated_edits, 1);
        assert_eq!(outcome.ignored, vec!["Notas".to_string()]);
        assert!(!resolver.is_open());

        assert_eq!(mapping.column(LogicalField::Sku), Some("Interno"));
        assert_eq!(mapping.column(LogicalField::Title), Some("Nombre"));
        assert_eq!(stage.get(8, LogicalField::Sku), Some("A-1"));
        // 解決されなかったヘッダーの編集は隔離されたまま
        assert_eq!(stage.unresolved_headers(), vec!["Notas".to_string()]);
        assert_eq!(stage.to_payload().len(), 1);
    }

    #[test]
    fn test_new_deduplicates_headers() {
        let resolver = RemapResolver::new(&["A", "B", "A"]);
        assert_eq!(resolver.unknown_headers(), &["A".to_string(), "B".to_string()]);
        assert!(resolver.is_open());
        assert!(!RemapResolver::new::<&str>(&[]).is_open());
    }

    #[test]
    fn test_response_into_choices() {
        let response: RemapResponse = serde_json::from_str(
            r#"{"mapping": {"Código Interno": "sku", "Notas": ""}}"#,
        )
        .unwrap();
        let choices = response.into_choices().unwrap();
        assert_eq!(choices["Código Interno"], Some(LogicalField::Sku));
        assert_eq!(choices["Notas"], None);

        let bad = RemapResponse {
            mapping: [("A".to_string(), "codigo".to_string())].into_iter().collect(),
        };
        assert!(matches!(
            bad.into_choices(),
            Err(SheetMapError::UnknownMappingTarget(_))
        ));
    }
}

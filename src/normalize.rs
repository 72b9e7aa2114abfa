//! Header Normalizer Module
//!
//! 生のヘッダー文字列を比較可能なトークン形式に正規化するモジュール。

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::NormalizedToken;

/// 除去する句読点
const STRIPPED_PUNCTUATION: &[char] = &['.', ':', ',', '(', ')', '[', ']'];

/// ヘッダー文字列を正規化する
///
/// 1. 小文字化
/// 2. NFD分解を行い、結合文字（アクセント記号など）を除去
/// 3. 固定の句読点（`. : , ( ) [ ]`）を除去
/// 4. 空白・アンダースコア・ハイフンの連続を1つのスペースに置換
/// 5. 前後の空白を除去
///
/// 空文字列を含むすべての文字列に対して定義された純粋関数であり、
/// 冪等です（`normalize(normalize(x)) == normalize(x)`）。
///
/// # 使用例
///
/// ```rust
/// use sheetmap::normalize;
///
/// assert_eq!(normalize("Código_Interno").as_str(), "codigo interno");
/// assert_eq!(normalize("  Precio (ARS) ").as_str(), "precio ars");
/// assert_eq!(normalize("").as_str(), "");
/// ```
pub fn normalize(raw: &str) -> NormalizedToken {
    let lowered = raw.to_lowercase();

    let stripped: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();

    NormalizedToken(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// 欠損している可能性のあるヘッダーを正規化する
///
/// `None`（欠損セル）は「分類不能」を表す`None`を返します。エラーにはなりません。
pub fn normalize_opt(raw: Option<&str>) -> Option<NormalizedToken> {
    raw.map(normalize)
}

/// 大文字小文字の違いだけを吸収した軽量な正規化
///
/// アクセント除去や区切り文字の置換を行わないため、`normalize()`の結果と
/// 比較することで「正規化しなければ一致しなかった」ヘッダーを判定できます。
pub(crate) fn fold_case(raw: &str) -> NormalizedToken {
    NormalizedToken(raw.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize("Título").as_str(), "titulo");
        assert_eq!(normalize("Descripción").as_str(), "descripcion");
        assert_eq!(normalize("Garantía").as_str(), "garantia");
        assert_eq!(normalize("Condición del Producto").as_str(), "condicion del producto");
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize("precio_final").as_str(), "precio final");
        assert_eq!(normalize("envio-gratis").as_str(), "envio gratis");
        assert_eq!(normalize("item \t  name").as_str(), "item name");
        assert_eq!(normalize("fulfillment__type").as_str(), "fulfillment type");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("Precio (ARS)").as_str(), "precio ars");
        assert_eq!(normalize("Cód.").as_str(), "cod");
        assert_eq!(normalize("[SKU]:").as_str(), "sku");
        assert_eq!(normalize("a . b").as_str(), "a b");
    }

    #[test]
    fn test_normalize_empty_and_blank() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert!(normalize("_-_").is_empty());
    }

    #[test]
    fn test_normalize_opt_missing_is_none() {
        assert_eq!(normalize_opt(None), None);
        assert_eq!(
            normalize_opt(Some("Stock")).map(|t| t.to_string()),
            Some("stock".to_string())
        );
    }

    #[test]
    fn test_fold_case_keeps_accents() {
        assert_eq!(fold_case(" Título ").as_str(), "título");
        assert_ne!(fold_case("Título"), normalize("Título"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_normalize_is_idempotent(raw in "[a-zA-Z0-9áéíóúñüÁÉÍÓÚÑÜ _.:,()\\[\\]\\-]{0,40}") {
                let once = normalize(&raw);
                let twice = normalize(once.as_str());
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn test_normalize_output_shape(raw in "[a-zA-Z0-9áéíóúñ _.:,()\\-]{0,40}") {
                let token = normalize(&raw);
                let s = token.as_str();
                prop_assert!(!s.starts_with(' ') && !s.ends_with(' '));
                prop_assert!(!s.contains("  "));
                prop_assert!(!s.chars().any(|c| STRIPPED_PUNCTUATION.contains(&c)));
                prop_assert!(!s.chars().any(|c| c.is_uppercase()));
            }
        }
    }
}

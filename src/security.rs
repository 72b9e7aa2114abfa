//! Security Module
//!
//! 入力サイズの制限と成果物ファイル名の検証を行うモジュール。
//! 巨大な入力ファイル、過大な編集バッチ、パストラバーサルを含むファイル名への対策を提供します。

use crate::error::SheetMapError;

/// セキュリティ設定
///
/// 入力処理時のセキュリティ制限を定義します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// 入力ワークブックの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_input_file_size: u64,
    /// ソースデータの最大行数
    /// デフォルト: 100000
    pub max_source_rows: usize,
    /// 1回の編集バッチの最大件数
    /// デフォルト: 10000
    pub max_edits_per_batch: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_file_size: 104_857_600, // 100MB
            max_source_rows: 100_000,
            max_edits_per_batch: 10_000,
        }
    }
}

impl SecurityConfig {
    /// デフォルトのセキュリティ設定を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力サイズを検証する
    pub(crate) fn check_input_size(&self, size: u64) -> Result<(), SheetMapError> {
        if size > self.max_input_file_size {
            return Err(SheetMapError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                size, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// ソース行数を検証する
    pub(crate) fn check_source_rows(&self, rows: usize) -> Result<(), SheetMapError> {
        if rows > self.max_source_rows {
            return Err(SheetMapError::SecurityViolation(format!(
                "Source row count exceeds maximum: {} rows (max: {} rows)",
                rows, self.max_source_rows
            )));
        }
        Ok(())
    }
}

/// 成果物ファイル名の検証
///
/// 成果物の保存先ディレクトリの外に書き込まれないよう、ファイル名を検証します。
///
/// # 引数
///
/// * `name` - 検証するファイル名（またはファイル名の接頭辞）
///
/// # 戻り値
///
/// * `Ok(())` - ファイル名が安全な場合
/// * `Err(String)` - ファイル名が危険な場合（`..`やパス区切り文字を含む）
pub(crate) fn validate_artifact_name(name: &str) -> Result<(), String> {
    // 空の名前は拒否
    if name.trim().is_empty() {
        return Err("Empty file name is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:`やUnix形式の`/`で始まるパス）
    if name.starts_with('/') || name.get(1..2) == Some(":") {
        return Err(format!("Absolute path is not allowed: {}", name));
    }

    // `..`を含む名前を拒否（ディレクトリトラバーサル攻撃）
    if name.contains("..") {
        return Err(format!("Path traversal detected: {}", name));
    }

    // パス区切り文字を拒否
    if name.contains('/') || name.contains('\\') {
        return Err(format!("Path separator in file name is not allowed: {}", name));
    }

    // 制御文字を拒否
    if name.chars().any(char::is_control) {
        return Err(format!("Control character in file name is not allowed: {:?}", name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_artifact_name_valid() {
        assert!(validate_artifact_name("ml_productos_mapeados").is_ok());
        assert!(validate_artifact_name("ml_productos_mapeados_20251120_142530.xlsx").is_ok());
        assert!(validate_artifact_name("catálogo-2025").is_ok());
    }

    #[test]
    fn test_validate_artifact_name_empty() {
        assert!(validate_artifact_name("").is_err());
        assert!(validate_artifact_name("   ").is_err());
    }

    #[test]
    fn test_validate_artifact_name_absolute() {
        assert!(validate_artifact_name("/etc/passwd").is_err());
        assert!(validate_artifact_name("C:\\Windows\\out.xlsx").is_err());
        assert!(validate_artifact_name("c:out.xlsx").is_err());
    }

    #[test]
    fn test_validate_artifact_name_traversal() {
        assert!(validate_artifact_name("../out.xlsx").is_err());
        assert!(validate_artifact_name("..").is_err());
        assert!(validate_artifact_name("out..xlsx").is_err());
    }

    #[test]
    fn test_validate_artifact_name_separators() {
        assert!(validate_artifact_name("uploads/out.xlsx").is_err());
        assert!(validate_artifact_name("uploads\\out.xlsx").is_err());
        assert!(validate_artifact_name("out\n.xlsx").is_err());
    }

    #[test]
    fn test_security_limits() {
        let config = SecurityConfig {
            max_input_file_size: 10,
            max_source_rows: 2,
            max_edits_per_batch: 1,
        };
        assert!(config.check_input_size(10).is_ok());
        assert!(matches!(
            config.check_input_size(11),
            Err(SheetMapError::SecurityViolation(_))
        ));
        assert!(config.check_source_rows(2).is_ok());
        assert!(config.check_source_rows(3).is_err());
    }
}

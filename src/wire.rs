//! Wire Module
//!
//! 書き込み要求・応答のワイヤー形式と、成果物の保存先を定義するモジュール。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::WriteMode;
use crate::defaults::DefaultSettings;
use crate::error::SheetMapError;
use crate::security::validate_artifact_name;
use crate::writer::{Artifact, FillSummary};

/// 書き込み要求
///
/// ```json
/// {
///   "ml_template": "plantilla_calzado.xlsx",
///   "product_data": "productos.xlsx",
///   "mapping": {"Título": "Nombre Producto", "Precio": "Precio"},
///   "default_settings": {"condition": "new"},
///   "write_mode": "fill-empty",
///   "edits": [{"row": 8, "field": "price", "value": "150"}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// テンプレート文書の参照（ファイル名など）
    pub ml_template: String,

    /// 商品データの参照（ファイル名など）
    pub product_data: String,

    /// テンプレートのラベル（または論理フィールドのキー）からソース列名へのマッピング
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,

    #[serde(default)]
    pub default_settings: DefaultSettings,

    #[serde(default)]
    pub write_mode: WriteMode,

    /// 編集ペイロード（`interactive`モードで必須）
    ///
    /// 形式の検証は書き込み時に行うため、ここでは任意のJSON値として受け取ります。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edits: Option<serde_json::Value>,
}

/// 書き込み結果のファイル情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub products_processed: usize,
    pub filename: String,
    /// 使用したマッピングのフィールド数
    pub mapping_fields: usize,
    pub write_mode: WriteMode,
}

/// 成果物のダウンロード参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRef {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// 書き込み応答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub file_info: FileInfo,
    pub download: DownloadRef,
    pub summary: FillSummary,
}

/// 成果物の保存先
///
/// 保存に失敗した場合は`SheetMapError::Upstream`を返します。
pub trait ArtifactSink {
    fn store(&self, artifact: &Artifact) -> Result<DownloadRef, SheetMapError>;
}

/// ディレクトリに成果物を保存する
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    base_url: Option<String>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            base_url: None,
        }
    }

    /// ダウンロードURLの基底を設定する（例: `https://example.com/downloads`）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn store(&self, artifact: &Artifact) -> Result<DownloadRef, SheetMapError> {
        validate_artifact_name(&artifact.filename).map_err(SheetMapError::SecurityViolation)?;

        let path = self.dir.join(&artifact.filename);
        std::fs::write(&path, &artifact.content).map_err(|e| {
            SheetMapError::Upstream(format!("failed to store {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), bytes = artifact.content.len(), "stored artifact");

        Ok(DownloadRef {
            filename: artifact.filename.clone(),
            url: self
                .base_url
                .as_ref()
                .map(|base| format!("{}/{}", base.trim_end_matches('/'), artifact.filename)),
        })
    }
}

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use toml::{Table, Value};
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::models::question::{Question, Resource};
use crate::models::viewer::ViewerProfile;

/// 题库 TOML 文件内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

/// 从单个 TOML 文件加载题目和资料
///
/// 逐条反序列化，格式错误的记录只跳过该条，同文件的其他记录照常加载
pub async fn load_catalog_file(toml_file_path: &Path) -> Result<CatalogFile, CatalogError> {
    let content =
        fs::read_to_string(toml_file_path)
            .await
            .map_err(|source| CatalogError::ReadFailed {
                path: toml_file_path.to_path_buf(),
                source,
            })?;

    let mut table: Table =
        toml::from_str(&content).map_err(|source| CatalogError::TomlParseFailed {
            path: toml_file_path.to_path_buf(),
            source,
        })?;

    Ok(CatalogFile {
        questions: take_records(&mut table, "questions", toml_file_path),
        resources: take_records(&mut table, "resources", toml_file_path),
    })
}

/// 取出 `[[key]]` 数组中能解析的记录
fn take_records<T: DeserializeOwned>(table: &mut Table, key: &str, path: &Path) -> Vec<T> {
    let entries = match table.remove(key) {
        None => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            warn!("⚠️ {} 中的 {} 不是数组，已忽略", path.display(), key);
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        match entry.try_into::<T>() {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                "⚠️ 跳过无效记录 {}[{}] (id={}) in {}: {}",
                key,
                idx,
                id,
                path.display(),
                e.message()
            ),
        }
    }
    records
}

/// 从文件夹中加载所有 TOML 文件并合并
///
/// 按文件名排序，保证插入顺序稳定；单个文件失败只记录警告
pub async fn load_catalog_folder(folder_path: &Path) -> Result<CatalogFile, CatalogError> {
    let mut merged = CatalogFile::default();

    if !folder_path.exists() {
        warn!("⚠️ 题库文件夹不存在: {}", folder_path.display());
        return Ok(merged);
    }

    let mut toml_files: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .map_err(|source| CatalogError::ReadFailed {
            path: folder_path.to_path_buf(),
            source,
        })?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| CatalogError::ReadFailed {
            path: folder_path.to_path_buf(),
            source,
        })?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    for path in toml_files {
        info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_catalog_file(&path).await {
            Ok(file) => {
                info!(
                    "成功加载 {} 道题目, {} 份资料",
                    file.questions.len(),
                    file.resources.len()
                );
                merged.questions.extend(file.questions);
                merged.resources.extend(file.resources);
            }
            Err(e) => {
                warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(merged)
}

/// 加载用户档案
pub async fn load_viewer_profile(path: &Path) -> Result<ViewerProfile, CatalogError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    toml::from_str(&content).map_err(|source| CatalogError::TomlParseFailed {
        path: path.to_path_buf(),
        source,
    })
}

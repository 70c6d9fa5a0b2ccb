//! 草稿持久化
//!
//! - [`FsDraftBackend`]：每份草稿一个 JSON 文件，先写临时文件再 rename
//! - [`MemDraftBackend`]：内存实现，用于测试

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::StoreError;
use crate::services::selection::draft::PaperDraft;

/// 草稿存储后端
pub trait DraftBackend: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<PaperDraft>, StoreError>;
    fn save(&self, draft: &PaperDraft) -> Result<(), StoreError>;
    /// 删除草稿，返回是否真的删除了
    fn delete(&self, name: &str) -> Result<bool, StoreError>;
    /// 按名称排序
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// 文件系统草稿存储
pub struct FsDraftBackend {
    root: PathBuf,
}

impl FsDraftBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn draft_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("draft-{}.json", name))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|source| StoreError::WriteFailed {
                path: self.root.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl DraftBackend for FsDraftBackend {
    fn load(&self, name: &str) -> Result<Option<PaperDraft>, StoreError> {
        let path = self.draft_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| StoreError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let draft = serde_json::from_str(&content)
            .map_err(|source| StoreError::Corrupted { path, source })?;
        Ok(Some(draft))
    }

    fn save(&self, draft: &PaperDraft) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let path = self.draft_path(&draft.name);
        let content = serde_json::to_string_pretty(draft)?;

        let tmp_path = self.root.join(format!(".draft-{}.tmp", draft.name));
        fs::write(&tmp_path, content).map_err(|source| StoreError::WriteFailed {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| StoreError::WriteFailed {
            path: path.clone(),
            source,
        })?;

        debug!("草稿已保存: {} ({} 道题)", path.display(), draft.entries.len());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.draft_path(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| StoreError::DeleteFailed { path, source })?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::ReadFailed {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::ReadFailed {
                path: self.root.clone(),
                source,
            })?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(name) = file_name
                .strip_prefix("draft-")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// 内存草稿存储
#[derive(Default)]
pub struct MemDraftBackend {
    drafts: Mutex<BTreeMap<String, String>>,
}

impl MemDraftBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

// 存序列化后的文本，与文件存储走同一条序列化路径
impl DraftBackend for MemDraftBackend {
    fn load(&self, name: &str) -> Result<Option<PaperDraft>, StoreError> {
        let drafts = self.drafts.lock().unwrap_or_else(|e| e.into_inner());
        match drafts.get(name) {
            Some(content) => Ok(Some(serde_json::from_str(content)?)),
            None => Ok(None),
        }
    }

    fn save(&self, draft: &PaperDraft) -> Result<(), StoreError> {
        let content = serde_json::to_string(draft)?;
        let mut drafts = self.drafts.lock().unwrap_or_else(|e| e.into_inner());
        drafts.insert(draft.name.clone(), content);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut drafts = self.drafts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(drafts.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let drafts = self.drafts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(drafts.keys().cloned().collect())
    }
}

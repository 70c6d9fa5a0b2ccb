//! 组卷选择 - 业务能力层
//!
//! 有序、去重的已选题目列表。每次修改先写入存储，写入成功后才更新内存，
//! 保证重新打开时顺序和内容完全一致。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{PaperMetadata, Question};
use crate::services::notice::Notice;
use crate::services::selection::backend::DraftBackend;
use crate::services::selection::draft::{is_valid_draft_name, PaperDraft, SelectionEntry};

/// 一次修改的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Added { position: usize },
    /// 已在试卷中，忽略
    AlreadySelected,
    Removed { position: usize },
    /// 不在试卷中，忽略
    NotSelected,
    Moved { from: usize, to: usize },
    /// 移动前后位置相同
    Unchanged,
}

impl SelectionChange {
    /// 加入/移除需要给用户提示，重复操作和移动不提示
    pub fn notice(&self) -> Option<Notice> {
        match self {
            SelectionChange::Added { position } => Some(Notice::success(format!(
                "Question added to paper (#{})",
                position + 1
            ))),
            SelectionChange::Removed { .. } => Some(Notice::success("Question removed from paper")),
            _ => None,
        }
    }
}

/// 当前草稿的已选题目
pub struct SelectionStore {
    backend: Arc<dyn DraftBackend>,
    draft: PaperDraft,
}

impl SelectionStore {
    /// 打开草稿，不存在时从空草稿开始（第一次修改时写入）
    pub fn open(backend: Arc<dyn DraftBackend>, name: &str) -> Result<Self, StoreError> {
        ensure_valid_name(name)?;
        let draft = match backend.load(name)? {
            Some(draft) => {
                info!("📂 打开草稿 '{}': {} 道题", name, draft.len());
                draft
            }
            None => {
                debug!("草稿 '{}' 不存在，使用空草稿", name);
                PaperDraft::new(name)
            }
        };
        Ok(Self { backend, draft })
    }

    /// 新建草稿并立即保存
    pub fn create(backend: Arc<dyn DraftBackend>, name: &str) -> Result<Self, StoreError> {
        ensure_valid_name(name)?;
        if backend.load(name)?.is_some() {
            return Err(StoreError::DraftExists {
                name: name.to_string(),
            });
        }
        let draft = PaperDraft::new(name);
        backend.save(&draft)?;
        info!("🆕 新建草稿 '{}'", name);
        Ok(Self { backend, draft })
    }

    /// 丢弃当前草稿
    pub fn discard(self) -> Result<bool, StoreError> {
        let removed = self.backend.delete(&self.draft.name)?;
        info!("🗑️ 丢弃草稿 '{}'", self.draft.name);
        Ok(removed)
    }

    pub fn draft(&self) -> &PaperDraft {
        &self.draft
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.draft.entries
    }

    pub fn len(&self) -> usize {
        self.draft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draft.is_empty()
    }

    /// 加入题目（已存在时不做任何事）
    pub fn add(&mut self, question: &Question) -> Result<SelectionChange, StoreError> {
        if self.draft.contains(&question.id) {
            debug!("题目 {} 已在试卷中，忽略", question.id);
            return Ok(SelectionChange::AlreadySelected);
        }

        let mut next = self.draft.clone();
        next.entries.push(SelectionEntry::capture(question));
        let position = next.entries.len() - 1;
        self.commit(next)?;

        Ok(SelectionChange::Added { position })
    }

    /// 移除题目（不存在时不做任何事）
    pub fn remove(&mut self, question_id: &str) -> Result<SelectionChange, StoreError> {
        let Some(position) = self.draft.position(question_id) else {
            debug!("题目 {} 不在试卷中，忽略", question_id);
            return Ok(SelectionChange::NotSelected);
        };

        let mut next = self.draft.clone();
        next.entries.remove(position);
        self.commit(next)?;

        Ok(SelectionChange::Removed { position })
    }

    /// 把 `from` 位置的题目移动到 `to`，其余题目依次顺移
    ///
    /// `to` 超出末尾时按末尾处理；`from` 越界或两者相同时不做任何事
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<SelectionChange, StoreError> {
        let len = self.draft.len();
        if from >= len {
            return Ok(SelectionChange::Unchanged);
        }
        let to = to.min(len - 1);
        if from == to {
            return Ok(SelectionChange::Unchanged);
        }

        let mut next = self.draft.clone();
        let entry = next.entries.remove(from);
        next.entries.insert(to, entry);
        self.commit(next)?;

        Ok(SelectionChange::Moved { from, to })
    }

    /// 键盘操作：上移一位
    pub fn move_up(&mut self, index: usize) -> Result<SelectionChange, StoreError> {
        match index.checked_sub(1) {
            Some(to) => self.reorder(index, to),
            None => Ok(SelectionChange::Unchanged),
        }
    }

    /// 键盘操作：下移一位
    pub fn move_down(&mut self, index: usize) -> Result<SelectionChange, StoreError> {
        self.reorder(index, index + 1)
    }

    pub fn set_metadata(&mut self, metadata: PaperMetadata) -> Result<(), StoreError> {
        let mut next = self.draft.clone();
        next.metadata = metadata;
        self.commit(next)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        let mut next = self.draft.clone();
        next.entries.clear();
        self.commit(next)
    }

    fn commit(&mut self, mut next: PaperDraft) -> Result<(), StoreError> {
        next.updated_at = Utc::now();
        self.backend.save(&next)?;
        self.draft = next;
        Ok(())
    }
}

/// 列出所有草稿
pub fn list_drafts(backend: &dyn DraftBackend) -> Result<Vec<String>, StoreError> {
    backend.list()
}

fn ensure_valid_name(name: &str) -> Result<(), StoreError> {
    if is_valid_draft_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidDraftName {
            name: name.to_string(),
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PaperMetadata, Question};

/// 组卷条目
///
/// 保存的是加入时的题目快照，之后题库里的修改不会反映到已选题目上，
/// 导出的也是这份快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub question: Question,
    pub captured_at: DateTime<Utc>,
}

impl SelectionEntry {
    pub fn capture(question: &Question) -> Self {
        Self {
            question: question.clone(),
            captured_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.question.id
    }
}

/// 组卷草稿
///
/// 每台设备可以同时保留多份草稿，按名称区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperDraft {
    pub name: String,
    #[serde(default)]
    pub metadata: PaperMetadata,
    #[serde(default)]
    pub entries: Vec<SelectionEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaperDraft {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            metadata: PaperMetadata::default(),
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.position(question_id).is_some()
    }

    pub fn position(&self, question_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == question_id)
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.entries.iter().map(|e| &e.question)
    }
}

/// 草稿名称只允许字母、数字、`-`、`_`，直接用作文件名
pub fn is_valid_draft_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

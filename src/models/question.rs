use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::subject::Subject;

/// 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        write!(f, "{}", name)
    }
}

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// 单选题
    #[serde(rename = "MCQ", alias = "mcq")]
    Mcq,
    /// 整数填空题
    #[serde(alias = "integer")]
    Integer,
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionKind::Mcq => write!(f, "MCQ"),
            QuestionKind::Integer => write!(f, "Integer"),
        }
    }
}

/// 正确答案：单选题为选项下标，填空题为原始文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Index(usize),
    Text(String),
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub subject: Subject,
    pub chapter: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: Answer,
    /// 指定可见的用户；为空表示全局可见（仍受科目/章节限制）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Question {
    /// 校验题目数据
    ///
    /// 单选题必须有选项，且答案下标落在选项范围内
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("题目ID为空".to_string());
        }
        if self.subject.is_blank() {
            return Err("科目为空".to_string());
        }
        if self.kind == QuestionKind::Mcq {
            if self.options.is_empty() {
                return Err("单选题缺少选项".to_string());
            }
            match &self.correct_answer {
                Answer::Index(idx) if *idx < self.options.len() => {}
                Answer::Index(idx) => {
                    return Err(format!(
                        "答案下标 {} 超出选项范围 [0, {}]",
                        idx,
                        self.options.len() - 1
                    ));
                }
                Answer::Text(_) => return Err("单选题答案必须是选项下标".to_string()),
            }
        }
        Ok(())
    }

    pub fn is_well_formed(&self) -> bool {
        self.validate().is_ok()
    }

    /// 答案的展示文本（单选题显示大写字母）
    pub fn answer_label(&self) -> String {
        match (&self.kind, &self.correct_answer) {
            (QuestionKind::Mcq, Answer::Index(idx)) => option_letter(*idx, LetterCase::Upper),
            (_, Answer::Index(idx)) => idx.to_string(),
            (_, Answer::Text(text)) => text.clone(),
        }
    }
}

/// 选项字母大小写
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterCase {
    /// 交互/管理界面：A/B/C/D
    Upper,
    /// 打印版面：a/b/c/d
    Lower,
}

/// 选项字母（从 0 开始计数）
pub fn option_letter(index: usize, case: LetterCase) -> String {
    let base = match case {
        LetterCase::Upper => b'A',
        LetterCase::Lower => b'a',
    };
    if index < 26 {
        ((base + index as u8) as char).to_string()
    } else {
        format!("{}{}", (base + (index % 26) as u8) as char, index / 26)
    }
}

/// 学习资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject: Subject,
    /// 外部下载地址
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.subject.is_blank()
    }
}

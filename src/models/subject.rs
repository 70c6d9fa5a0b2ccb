use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 科目别名表（key 为小写后的写法）
static SUBJECT_ALIASES: phf::Map<&'static str, Subject> = phf_map! {
    "maths" => Subject::Maths,
    "math" => Subject::Maths,
    "mathematics" => Subject::Maths,
    "数学" => Subject::Maths,
    "physics" => Subject::Physics,
    "phy" => Subject::Physics,
    "物理" => Subject::Physics,
    "chemistry" => Subject::Chemistry,
    "chem" => Subject::Chemistry,
    "化学" => Subject::Chemistry,
};

/// 科目
///
/// 内置 maths / physics / chemistry 三科，其余科目以 `Other` 保留原始写法，
/// 比较时统一使用 [`Subject::key`]。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    Maths,
    Physics,
    Chemistry,
    Other(String),
}

impl Subject {
    /// 解析科目（大小写不敏感，支持常见别名）
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        match SUBJECT_ALIASES.get(normalized.as_str()) {
            Some(subject) => subject.clone(),
            None => Subject::Other(normalized),
        }
    }

    /// 归一化后的比较键
    pub fn key(&self) -> &str {
        match self {
            Subject::Maths => "maths",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Other(name) => name.as_str(),
        }
    }

    /// 显示名称
    pub fn label(&self) -> String {
        match self {
            Subject::Maths => "Maths".to_string(),
            Subject::Physics => "Physics".to_string(),
            Subject::Chemistry => "Chemistry".to_string(),
            Subject::Other(name) => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }

    /// 科目名为空的记录无法参与可见性判断
    pub fn is_blank(&self) -> bool {
        self.key().is_empty()
    }
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        Subject::parse(&s)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.key().to_string()
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

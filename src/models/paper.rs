use serde::{Deserialize, Serialize};

/// 试卷抬头信息
///
/// 不做校验，空值按空白渲染
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(default)]
    pub institute_name: String,
    #[serde(default)]
    pub exam_title: String,
}

impl PaperMetadata {
    pub fn new(institute_name: impl Into<String>, exam_title: impl Into<String>) -> Self {
        Self {
            institute_name: institute_name.into(),
            exam_title: exam_title.into(),
        }
    }

    /// 导出文件名（不含扩展名）
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .exam_title
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let stem = stem.trim_matches('_');
        if stem.is_empty() {
            "Question_Paper".to_string()
        } else {
            stem.to_string()
        }
    }
}

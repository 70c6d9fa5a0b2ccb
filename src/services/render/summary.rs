use serde::Serialize;

use crate::models::Subject;

/// 每道题的建议用时（分钟）
pub const MINUTES_PER_QUESTION: usize = 3;
/// 每道题的分值
pub const MARKS_PER_QUESTION: usize = 4;

/// 试卷汇总字段，只由题目数量和显示科目推导
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperSummary {
    pub question_count: usize,
    pub total_minutes: usize,
    pub total_marks: usize,
    /// 当前显示筛选中的科目，大写，逗号分隔
    pub subject_line: String,
}

impl PaperSummary {
    pub fn new(question_count: usize, display_subjects: &[Subject]) -> Self {
        let mut labels: Vec<String> = Vec::new();
        for subject in display_subjects {
            let label = subject.label().to_uppercase();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        Self {
            question_count,
            total_minutes: MINUTES_PER_QUESTION * question_count,
            total_marks: MARKS_PER_QUESTION * question_count,
            subject_line: labels.join(", "),
        }
    }
}

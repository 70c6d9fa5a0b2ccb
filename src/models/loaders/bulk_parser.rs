//! 批量题目解析
//!
//! 把管理员粘贴的原始文本拆成题目。题目之间以空行分隔：
//!
//! ```text
//! 1. A ball is dropped from $h = 20$ m. Time to reach the ground?
//! A) 1 s
//! B) 2 s
//! Answer: B
//!
//! Q2. Value of $x$ if $2x = 10$?
//! Ans: 5
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::question::{Answer, Difficulty, Question, QuestionKind};
use crate::models::subject::Subject;

static NUMBER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:q(?:uestion)?\s*)?\d+\s*[.):]\s*").expect("valid regex")
});

static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(?([A-Za-z])[).]\s+(.*)$").expect("valid regex"));

static ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:correct\s+answer|answer|ans)\s*[:：]\s*(.+?)\s*$").expect("valid regex")
});

/// 批量导入时统一使用的字段
#[derive(Debug, Clone)]
pub struct BulkDefaults {
    pub id_prefix: String,
    pub subject: Subject,
    pub chapter: String,
    pub difficulty: Difficulty,
}

/// 被跳过的题块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// 题块序号（从1开始）
    pub block: usize,
    pub reason: String,
}

/// 解析结果
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub questions: Vec<Question>,
    pub skipped: Vec<SkippedBlock>,
}

/// 解析粘贴的原始文本
pub fn parse_bulk_questions(raw: &str, defaults: &BulkDefaults) -> ParseReport {
    let mut report = ParseReport::default();

    for (idx, block) in split_blocks(raw).into_iter().enumerate() {
        let block_no = idx + 1;
        let id = format!("{}-{}", defaults.id_prefix, report.questions.len() + 1);

        match parse_block(&block, id, defaults) {
            Ok(question) => {
                debug!("题块 {} 解析成功: {}", block_no, question.id);
                report.questions.push(question);
            }
            Err(reason) => {
                warn!("⚠️ 跳过题块 {}: {}", block_no, reason);
                report.skipped.push(SkippedBlock {
                    block: block_no,
                    reason,
                });
            }
        }
    }

    report
}

fn split_blocks(raw: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_block(lines: &[&str], id: String, defaults: &BulkDefaults) -> Result<Question, String> {
    let mut content_lines: Vec<String> = Vec::new();
    let mut options: Vec<String> = Vec::new();
    let mut answer: Option<String> = None;

    for (line_no, line) in lines.iter().enumerate() {
        if let Some(caps) = ANSWER_LINE.captures(line) {
            answer = Some(caps[1].to_string());
            continue;
        }

        // 选项字母必须按 A、B、C... 依次出现，否则当作题干
        if let Some(caps) = OPTION_LINE.captures(line) {
            let letter = caps[1].to_ascii_uppercase();
            let expected = (b'A' + options.len() as u8) as char;
            if !content_lines.is_empty() && letter.starts_with(expected) {
                options.push(caps[2].trim().to_string());
                continue;
            }
        }

        let text = if line_no == 0 {
            NUMBER_PREFIX.replace(line, "").to_string()
        } else {
            line.to_string()
        };
        if !options.is_empty() {
            return Err(format!("选项之后出现了题干内容: '{}'", text.trim()));
        }
        content_lines.push(text.trim_end().to_string());
    }

    let content = content_lines.join("\n").trim().to_string();
    if content.is_empty() {
        return Err("题干为空".to_string());
    }
    let answer = answer.ok_or_else(|| "缺少答案行".to_string())?;

    let (kind, correct_answer) = if options.is_empty() {
        (QuestionKind::Integer, Answer::Text(answer))
    } else {
        let index = letter_index(&answer)
            .filter(|idx| *idx < options.len())
            .ok_or_else(|| format!("答案 '{}' 不是有效的选项字母", answer))?;
        (QuestionKind::Mcq, Answer::Index(index))
    };

    Ok(Question {
        id,
        subject: defaults.subject.clone(),
        chapter: defaults.chapter.clone(),
        difficulty: defaults.difficulty,
        kind,
        content,
        options,
        correct_answer,
        assigned_to: None,
        created_at: None,
    })
}

fn letter_index(answer: &str) -> Option<usize> {
    let trimmed = answer.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Some((c.to_ascii_uppercase() as u8 - b'A') as usize)
        }
        _ => None,
    }
}

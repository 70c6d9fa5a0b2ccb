//! 试卷版面渲染
//!
//! 同一份组卷数据渲染成两棵互不依赖的树：
//! - 打印版：固定页宽，题干完整，选项 a/b/c/d，带抬头、须知和汇总
//! - 交互版：紧凑列表，可拖拽排序，选项 A/B/C/D
//!
//! 输出只取决于（题目顺序, 抬头信息, 题目内容），相同输入得到相同 HTML。

use minijinja::{context, Environment};
use serde::Serialize;
use tracing::debug;

use crate::error::RenderError;
use crate::models::{option_letter, LetterCase, Question, Subject};
use crate::services::render::markup::{self, Segment};
use crate::services::render::summary::{PaperSummary, MARKS_PER_QUESTION};
use crate::services::selection::{PaperDraft, SelectionEntry};

/// 默认页宽（A4 在 96dpi 下的像素宽度）
pub const PAGE_WIDTH_PX: u32 = 794;

const PRINT_TEMPLATE: &str = "print.html";
const SCREEN_TEMPLATE: &str = "screen.html";

const TEMPLATES: [(&str, &str); 4] = [
    ("_macros.html", include_str!("templates/_macros.html")),
    ("_math_head.html", include_str!("templates/_math_head.html")),
    (PRINT_TEMPLATE, include_str!("templates/print.html")),
    (SCREEN_TEMPLATE, include_str!("templates/screen.html")),
];

#[derive(Debug, Serialize)]
struct OptionView {
    letter: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Serialize)]
struct QuestionView<'a> {
    number: usize,
    id: &'a str,
    subject: String,
    chapter: &'a str,
    difficulty: String,
    kind: String,
    segments: Vec<Segment>,
    options: Vec<OptionView>,
}

impl<'a> QuestionView<'a> {
    fn build(number: usize, question: &'a Question, case: LetterCase) -> Self {
        Self {
            number,
            id: &question.id,
            subject: question.subject.label(),
            chapter: &question.chapter,
            difficulty: question.difficulty.to_string(),
            kind: question.kind.to_string(),
            segments: markup::parse(&question.content),
            options: question
                .options
                .iter()
                .enumerate()
                .map(|(idx, option)| OptionView {
                    letter: option_letter(idx, case),
                    segments: markup::parse(option),
                })
                .collect(),
        }
    }
}

fn question_views(entries: &[SelectionEntry], case: LetterCase) -> Vec<QuestionView<'_>> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| QuestionView::build(idx + 1, &entry.question, case))
        .collect()
}

fn instructions(summary: &PaperSummary) -> Vec<String> {
    vec![
        format!(
            "This paper contains {} questions. The duration of the test is {} minutes.",
            summary.question_count, summary.total_minutes
        ),
        format!(
            "Each question carries {} marks. The maximum marks are {}.",
            MARKS_PER_QUESTION, summary.total_marks
        ),
        "For multiple choice questions, only one option is correct.".to_string(),
        "For integer type questions, write the exact numerical answer.".to_string(),
        "Use of calculators and electronic devices is not permitted.".to_string(),
    ]
}

/// 打印版渲染结果
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPaper {
    pub html: String,
    pub page_width_px: u32,
    pub summary: PaperSummary,
}

/// 试卷渲染器
pub struct PaperRenderer {
    env: Environment<'static>,
    page_width_px: u32,
    math_assets_url: String,
}

impl PaperRenderer {
    pub fn new(
        page_width_px: u32,
        math_assets_url: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|source| RenderError::Template {
                    template: name,
                    source,
                })?;
        }
        Ok(Self {
            env,
            page_width_px,
            math_assets_url: math_assets_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn page_width_px(&self) -> u32 {
        self.page_width_px
    }

    /// 渲染打印版
    ///
    /// `display_subjects` 是当前显示筛选中的科目，用于抬头的科目行
    pub fn render_print_html(
        &self,
        draft: &PaperDraft,
        display_subjects: &[Subject],
    ) -> Result<RenderedPaper, RenderError> {
        let summary = PaperSummary::new(draft.len(), display_subjects);
        let html = self.render(
            PRINT_TEMPLATE,
            context! {
                metadata => &draft.metadata,
                summary => &summary,
                instructions => instructions(&summary),
                questions => question_views(&draft.entries, LetterCase::Lower),
                page_width_px => self.page_width_px,
                math_assets_url => &self.math_assets_url,
            },
        )?;
        debug!(
            "打印版渲染完成: {} 道题, {} 字节",
            summary.question_count,
            html.len()
        );
        Ok(RenderedPaper {
            html,
            page_width_px: self.page_width_px,
            summary,
        })
    }

    /// 渲染交互列表
    pub fn render_screen_html(
        &self,
        draft: &PaperDraft,
        display_subjects: &[Subject],
    ) -> Result<String, RenderError> {
        let summary = PaperSummary::new(draft.len(), display_subjects);
        self.render(
            SCREEN_TEMPLATE,
            context! {
                summary => &summary,
                questions => question_views(&draft.entries, LetterCase::Upper),
                math_assets_url => &self.math_assets_url,
            },
        )
    }

    fn render(&self, template: &'static str, ctx: minijinja::Value) -> Result<String, RenderError> {
        self.env
            .get_template(template)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(|source| RenderError::Template { template, source })
    }
}

/// 单道题的终端文本
pub fn question_text(number: usize, question: &Question, case: LetterCase) -> String {
    let mut out = format!(
        "{}. [{} | {} | {} | {}] {}",
        number,
        question.subject.label(),
        question.chapter,
        question.difficulty,
        question.kind,
        markup::to_plain(&markup::parse(&question.content))
    );
    for (idx, option) in question.options.iter().enumerate() {
        out.push_str(&format!(
            "\n    {}. {}",
            option_letter(idx, case),
            markup::to_plain(&markup::parse(option))
        ));
    }
    out
}

/// 已选题目列表的终端文本
pub fn render_selection_text(draft: &PaperDraft, display_subjects: &[Subject]) -> String {
    if draft.is_empty() {
        return "No questions selected yet.".to_string();
    }
    let summary = PaperSummary::new(draft.len(), display_subjects);
    let mut out = format!(
        "{} selected | {} min | {} marks | {}\n",
        summary.question_count, summary.total_minutes, summary.total_marks, summary.subject_line
    );
    for (idx, entry) in draft.entries.iter().enumerate() {
        out.push('\n');
        out.push_str(&question_text(idx + 1, &entry.question, LetterCase::Upper));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, Difficulty, PaperMetadata, QuestionKind};

    fn question(id: &str, content: &str, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            subject: Subject::Maths,
            chapter: "Algebra".to_string(),
            difficulty: Difficulty::Medium,
            kind: if options.is_empty() {
                QuestionKind::Integer
            } else {
                QuestionKind::Mcq
            },
            content: content.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: if options.is_empty() {
                Answer::Text("4".into())
            } else {
                Answer::Index(0)
            },
            assigned_to: None,
            created_at: None,
        }
    }

    fn draft(questions: &[Question]) -> PaperDraft {
        let mut draft = PaperDraft::new("test");
        draft.metadata = PaperMetadata::new("Sunrise Academy", "Weekly Test 3");
        draft.entries = questions.iter().map(SelectionEntry::capture).collect();
        draft
    }

    fn renderer() -> PaperRenderer {
        PaperRenderer::new(PAGE_WIDTH_PX, "katex").unwrap()
    }

    #[test]
    fn test_print_layout_is_deterministic() {
        let d = draft(&[question("q1", "Solve $x+1=2$", &["1", "2"])]);
        let r = renderer();
        let first = r.render_print_html(&d, &[Subject::Maths]).unwrap();
        let second = r.render_print_html(&d, &[Subject::Maths]).unwrap();
        assert_eq!(first, second);
        assert!(first.html.contains("width: 794px"));
    }

    #[test]
    fn test_print_layout_summary_and_header() {
        let d = draft(&[
            question("q1", "First", &["a1", "b1"]),
            question("q2", "Second", &[]),
        ]);
        let paper = renderer()
            .render_print_html(&d, &[Subject::Maths, Subject::Physics])
            .unwrap();
        assert!(paper.html.contains("Sunrise Academy"));
        assert!(paper.html.contains("Weekly Test 3"));
        assert!(paper.html.contains("Time: 6 Minutes"));
        assert!(paper.html.contains("Max. Marks: 8"));
        assert!(paper.html.contains("Subjects: MATHS, PHYSICS"));
    }

    #[test]
    fn test_numbering_follows_selection_order() {
        let d = draft(&[question("qb", "Beta", &[]), question("qa", "Alpha", &[])]);
        let html = renderer().render_print_html(&d, &[]).unwrap().html;
        let beta = html.find("Q1.</span><span class=\"content\">Beta").unwrap();
        let alpha = html.find("Q2.</span><span class=\"content\">Alpha").unwrap();
        assert!(beta < alpha);
    }

    #[test]
    fn test_option_letter_case_differs_between_layouts() {
        let d = draft(&[question("q1", "Pick", &["red", "blue"])]);
        let r = renderer();
        let print = r.render_print_html(&d, &[]).unwrap().html;
        let screen = r.render_screen_html(&d, &[]).unwrap();
        assert!(print.contains("(a) red"));
        assert!(print.contains("(b) blue"));
        assert!(screen.contains("<strong>A.</strong> red"));
        assert!(screen.contains("<strong>B.</strong> blue"));
    }

    #[test]
    fn test_math_markup_identical_in_both_layouts() {
        let d = draft(&[question("q1", r"Evaluate $$\int x dx$$ and \(y\)", &[])]);
        let r = renderer();
        let print = r.render_print_html(&d, &[]).unwrap().html;
        let screen = r.render_screen_html(&d, &[]).unwrap();
        for fragment in [
            r#"<span class="math math-display">\[\int x dx\]</span>"#,
            r#"<span class="math math-inline">\(y\)</span>"#,
        ] {
            assert!(print.contains(fragment));
            assert!(screen.contains(fragment));
        }
    }

    #[test]
    fn test_content_is_escaped() {
        let d = draft(&[question("q1", "Is a <b> tag & text?", &[])]);
        let html = renderer().render_print_html(&d, &[]).unwrap().html;
        assert!(html.contains("Is a &lt;b&gt; tag &amp; text?"));
    }

    #[test]
    fn test_empty_metadata_renders_blank() {
        let mut d = draft(&[question("q1", "Only", &[])]);
        d.metadata = PaperMetadata::default();
        let html = renderer().render_print_html(&d, &[]).unwrap().html;
        assert!(html.contains("<h1 class=\"institute\"></h1>"));
        assert!(html.contains("<h2 class=\"exam-title\"></h2>"));
    }

    #[test]
    fn test_screen_layout_is_draggable() {
        let d = draft(&[question("q1", "One", &[]), question("q2", "Two", &[])]);
        let screen = renderer().render_screen_html(&d, &[]).unwrap();
        assert!(screen.contains("draggable=\"true\""));
        assert!(screen.contains("data-index=\"1\""));

        let empty = renderer().render_screen_html(&PaperDraft::new("e"), &[]).unwrap();
        assert!(empty.contains("No questions selected yet."));
    }

    #[test]
    fn test_terminal_text() {
        let d = draft(&[question("q1", r"Find \(x\)", &["one", "two"])]);
        let text = render_selection_text(&d, &[Subject::Maths]);
        assert!(text.starts_with("1 selected | 3 min | 4 marks | MATHS"));
        assert!(text.contains("1. [Maths | Algebra | Medium | MCQ] Find $x$"));
        assert!(text.contains("    B. two"));
        assert_eq!(
            render_selection_text(&PaperDraft::new("e"), &[]),
            "No questions selected yet."
        );
    }
}

//! 试卷渲染

pub mod layout;
pub mod markup;
pub mod summary;

pub use layout::{
    question_text, render_selection_text, PaperRenderer, RenderedPaper, PAGE_WIDTH_PX,
};
pub use markup::Segment;
pub use summary::PaperSummary;

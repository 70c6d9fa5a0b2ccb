//! 导出流程
//!
//! 顺序固定：空卷检查 → 渲染打印版 → 栅格化 → 计算页高/分页 → 打包 → 保存。
//! 任一步失败都转换成带提示文字的 [`ExportError`]，状态一定回到空闲。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use crate::error::ExportError;
use crate::models::Subject;
use crate::services::export::geometry::{layout_pages, Bitmap, PaginationMode};
use crate::services::export::packager::DocumentPackager;
use crate::services::export::rasterizer::Rasterizer;
use crate::services::export::sink::DocumentSink;
use crate::services::notice::Notice;
use crate::services::render::PaperRenderer;
use crate::services::selection::PaperDraft;

/// 导出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Exporting,
}

/// 导出结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub page_count: usize,
    pub page_width_pt: f64,
    pub page_height_pt: f64,
    pub bytes: usize,
}

/// 离开作用域时把状态恢复为空闲
struct ExportingGuard<'a>(&'a AtomicBool);

impl Drop for ExportingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExportPipeline<R, P, S> {
    renderer: PaperRenderer,
    rasterizer: R,
    packager: P,
    sink: S,
    page_width_pt: f64,
    pagination: PaginationMode,
    exporting: AtomicBool,
}

impl<R, P, S> ExportPipeline<R, P, S>
where
    R: Rasterizer,
    P: DocumentPackager,
    S: DocumentSink,
{
    pub fn new(
        renderer: PaperRenderer,
        rasterizer: R,
        packager: P,
        sink: S,
        page_width_pt: f64,
        pagination: PaginationMode,
    ) -> Self {
        Self {
            renderer,
            rasterizer,
            packager,
            sink,
            page_width_pt,
            pagination,
            exporting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ExportState {
        if self.exporting.load(Ordering::Acquire) {
            ExportState::Exporting
        } else {
            ExportState::Idle
        }
    }

    /// 导出试卷
    ///
    /// 空卷直接失败，不会调用栅格化；导出进行中再次调用返回 `AlreadyExporting`
    pub async fn export(
        &self,
        draft: &PaperDraft,
        display_subjects: &[Subject],
    ) -> Result<ExportReport, ExportError> {
        if draft.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        if self
            .exporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ExportError::AlreadyExporting);
        }
        let _guard = ExportingGuard(&self.exporting);

        info!("📄 开始导出试卷: {} 道题", draft.len());
        let paper = self.renderer.render_print_html(draft, display_subjects)?;

        let png = self.rasterizer.rasterize(&paper).await?;
        let bitmap = Bitmap::from_png(png)?;
        info!("🖼️ 栅格化完成: {}x{}", bitmap.width(), bitmap.height());

        let pages = layout_pages(bitmap, self.page_width_pt, self.pagination)?;
        let page_height_pt = pages.first().map(|p| p.height_pt).unwrap_or_default();

        let document = self.packager.package(&pages).await?;
        let file_name = format!("{}.pdf", draft.metadata.file_stem());
        let path = self.sink.save(&file_name, &document).await?;

        info!("✅ 导出完成: {} ({} 页)", path.display(), pages.len());
        Ok(ExportReport {
            path,
            page_count: pages.len(),
            page_width_pt: self.page_width_pt,
            page_height_pt,
            bytes: document.len(),
        })
    }

    /// 导出并转换成提示
    pub async fn export_notice(&self, draft: &PaperDraft, display_subjects: &[Subject]) -> Notice {
        match self.export(draft, display_subjects).await {
            Ok(report) => Notice::success(format!(
                "Paper exported to {}",
                report.path.display()
            )),
            Err(e) => {
                error!("❌ 导出失败: {}", e);
                Notice::failure(e.user_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use crate::models::{Answer, Difficulty, PaperMetadata, Question, QuestionKind};
    use crate::services::export::geometry::{PageSegment, A4_WIDTH_PT};
    use crate::services::render::{RenderedPaper, PAGE_WIDTH_PX};
    use crate::services::selection::SelectionEntry;

    struct FakeRasterizer {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl FakeRasterizer {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
            }
        }
    }

    impl Rasterizer for FakeRasterizer {
        async fn rasterize(&self, paper: &RenderedPaper) -> Result<Vec<u8>, ExportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ExportError::Rasterize("unsupported color function".into()));
            }
            let img = RgbaImage::from_pixel(paper.page_width_px, 1500, Rgba([255; 4]));
            let mut png = Vec::new();
            DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(ExportError::Bitmap)?;
            Ok(png)
        }
    }

    #[derive(Default)]
    struct FakePackager {
        pages: Mutex<Vec<(f64, f64)>>,
    }

    impl DocumentPackager for FakePackager {
        async fn package(&self, pages: &[PageSegment]) -> Result<Vec<u8>, ExportError> {
            let mut seen = self.pages.lock().unwrap();
            seen.extend(pages.iter().map(|p| (p.width_pt, p.height_pt)));
            Ok(b"%PDF-fake".to_vec())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<(String, usize)>>,
        fail: bool,
    }

    impl DocumentSink for MemorySink {
        async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
            if self.fail {
                return Err(ExportError::SaveFailed {
                    path: PathBuf::from(file_name),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), bytes.len()));
            Ok(PathBuf::from("/exports").join(file_name))
        }
    }

    fn pipeline(
        rasterizer: FakeRasterizer,
        sink: MemorySink,
    ) -> ExportPipeline<FakeRasterizer, FakePackager, MemorySink> {
        ExportPipeline::new(
            PaperRenderer::new(PAGE_WIDTH_PX, "katex").unwrap(),
            rasterizer,
            FakePackager::default(),
            sink,
            A4_WIDTH_PT,
            PaginationMode::SingleImage,
        )
    }

    fn draft_with_questions(n: usize) -> PaperDraft {
        let mut draft = PaperDraft::new("test");
        draft.metadata = PaperMetadata::new("Academy", "Unit Test");
        draft.entries = (0..n)
            .map(|i| {
                SelectionEntry::capture(&Question {
                    id: format!("q{}", i),
                    subject: Subject::Physics,
                    chapter: "Optics".into(),
                    difficulty: Difficulty::Easy,
                    kind: QuestionKind::Integer,
                    content: format!("Question {}", i),
                    options: vec![],
                    correct_answer: Answer::Text("1".into()),
                    assigned_to: None,
                    created_at: None,
                })
            })
            .collect();
        draft
    }

    #[tokio::test]
    async fn test_empty_selection_never_rasterizes() {
        let p = pipeline(FakeRasterizer::ok(), MemorySink::default());
        let err = p.export(&PaperDraft::new("empty"), &[]).await.unwrap_err();
        assert!(matches!(err, ExportError::EmptySelection));
        assert_eq!(p.rasterizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(p.state(), ExportState::Idle);
    }

    #[tokio::test]
    async fn test_successful_export_reports_saved_path() {
        let p = pipeline(FakeRasterizer::ok(), MemorySink::default());
        let report = p.export(&draft_with_questions(2), &[Subject::Physics]).await.unwrap();

        assert_eq!(report.path, PathBuf::from("/exports/Unit_Test.pdf"));
        assert_eq!(report.page_count, 1);
        // 794x1500 位图 → 595.28pt 宽
        assert!((report.page_height_pt - 1500.0 * A4_WIDTH_PT / 794.0).abs() < 1e-6);
        assert_eq!(p.sink.saved.lock().unwrap().len(), 1);
        assert_eq!(p.packager.pages.lock().unwrap().len(), 1);
        assert_eq!(p.state(), ExportState::Idle);
    }

    #[tokio::test]
    async fn test_rasterize_failure_surfaces_and_returns_to_idle() {
        let mut rasterizer = FakeRasterizer::ok();
        rasterizer.fail = true;
        let p = pipeline(rasterizer, MemorySink::default());

        let notice = p.export_notice(&draft_with_questions(1), &[]).await;
        assert!(notice.is_failure());
        assert!(notice.message().contains("unsupported color function"));
        assert!(p.sink.saved.lock().unwrap().is_empty());
        assert_eq!(p.state(), ExportState::Idle);
    }

    #[tokio::test]
    async fn test_save_failure_is_not_reported_as_success() {
        let sink = MemorySink {
            fail: true,
            ..Default::default()
        };
        let p = pipeline(FakeRasterizer::ok(), sink);
        let notice = p.export_notice(&draft_with_questions(1), &[]).await;
        assert!(notice.is_failure());
        assert_eq!(p.state(), ExportState::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_export_is_rejected() {
        let mut rasterizer = FakeRasterizer::ok();
        rasterizer.delay = Duration::from_millis(50);
        let p = pipeline(rasterizer, MemorySink::default());
        let draft = draft_with_questions(1);

        let (first, second) = tokio::join!(p.export(&draft, &[]), async {
            tokio::task::yield_now().await;
            p.export(&draft, &[]).await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(ExportError::AlreadyExporting)));
        assert_eq!(p.rasterizer.calls.load(Ordering::SeqCst), 1);

        // 结束后可以再次导出
        assert!(p.export(&draft, &[]).await.is_ok());
    }
}

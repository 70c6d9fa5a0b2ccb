use std::future::Future;
use std::path::Path;

use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use tracing::debug;

use crate::error::ExportError;
use crate::services::export::geometry::PageSegment;

/// 1 英寸 = 72pt
const POINTS_PER_INCH: f64 = 72.0;

/// 把页面图片打包成文档
pub trait DocumentPackager {
    fn package(
        &self,
        pages: &[PageSegment],
    ) -> impl Future<Output = Result<Vec<u8>, ExportError>> + Send;
}

/// 用 Chromium 的打印功能生成 PDF
///
/// 每页图片铺满整页，无边距
pub struct ChromePdfPackager {
    page: Page,
}

impl ChromePdfPackager {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

/// 包装页面：每张图片单独一页
fn wrapper_html(pages: &[PageSegment]) -> String {
    let (width_pt, height_pt) = pages
        .first()
        .map(|p| (p.width_pt, p.height_pt))
        .unwrap_or_default();
    let images: String = (0..pages.len())
        .map(|idx| format!("<img src=\"page-{}.png\">", idx))
        .collect();
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>\
         @page {{ size: {w}pt {h}pt; margin: 0; }}\
         html, body {{ margin: 0; padding: 0; }}\
         img {{ display: block; width: {w}pt; height: {h}pt; break-after: page; }}\
         img:last-child {{ break-after: auto; }}\
         </style></head><body>{images}</body></html>",
        w = width_pt,
        h = height_pt,
        images = images
    )
}

fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

fn package_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::Package(e.to_string())
}

impl DocumentPackager for ChromePdfPackager {
    async fn package(&self, pages: &[PageSegment]) -> Result<Vec<u8>, ExportError> {
        let Some(first) = pages.first() else {
            return Err(ExportError::Package("没有可打包的页面".to_string()));
        };

        // 临时目录在函数结束时删除
        let staging = tempfile::Builder::new()
            .prefix("paper-export-")
            .tempdir()
            .map_err(package_error)?;
        for (idx, page) in pages.iter().enumerate() {
            tokio::fs::write(staging.path().join(format!("page-{}.png", idx)), &page.png)
                .await
                .map_err(package_error)?;
        }
        let wrapper = staging.path().join("document.html");
        tokio::fs::write(&wrapper, wrapper_html(pages))
            .await
            .map_err(package_error)?;

        self.page.goto(file_url(&wrapper)).await.map_err(package_error)?;

        let params = PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            paper_width: Some(first.width_pt / POINTS_PER_INCH),
            paper_height: Some(first.height_pt / POINTS_PER_INCH),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            ..Default::default()
        };
        let pdf = self.page.pdf(params).await.map_err(package_error)?;
        debug!("PDF 生成完成: {} 页, {} 字节", pages.len(), pdf.len());
        Ok(pdf)
    }
}

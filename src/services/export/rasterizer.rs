use std::future::Future;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::page::ScreenshotParams;
use tracing::{debug, warn};

use crate::error::{BrowserError, ExportError};
use crate::infrastructure::JsExecutor;
use crate::services::export::geometry::stitch_vertical;
use crate::services::render::RenderedPaper;

/// 初始视口高度（A4 在 96dpi 下的像素高度）
const INITIAL_VIEWPORT_HEIGHT: i64 = 1123;

/// 单次截图的最大高度（设备像素），Chromium 的截图尺寸上限约为 16384
const MAX_TILE_DEVICE_PX: f64 = 8192.0;

/// 把打印版 HTML 转成 PNG 位图
pub trait Rasterizer {
    fn rasterize(
        &self,
        paper: &RenderedPaper,
    ) -> impl Future<Output = Result<Vec<u8>, ExportError>> + Send;
}

/// 基于无头 Chromium 的栅格化
///
/// 视口宽度固定为版面页宽，按 `device_scale_factor` 过采样
pub struct ChromeRasterizer {
    executor: JsExecutor,
    device_scale_factor: f64,
    math_wait: Duration,
}

impl ChromeRasterizer {
    pub fn new(executor: JsExecutor, device_scale_factor: f64, math_wait: Duration) -> Self {
        Self {
            executor,
            device_scale_factor,
            math_wait,
        }
    }

    async fn set_viewport(&self, width: i64, height: i64) -> Result<(), BrowserError> {
        let params =
            SetDeviceMetricsOverrideParams::new(width, height, self.device_scale_factor, false);
        self.executor.page().execute(params).await?;
        Ok(())
    }

    /// 单段截图的最大高度（css px）
    fn max_tile_height(&self) -> i64 {
        ((MAX_TILE_DEVICE_PX / self.device_scale_factor.max(1.0)).floor() as i64).max(1)
    }

    /// 逐段截图，长试卷不会超过单次截图的尺寸上限
    async fn capture_tiles(&self, paper: &RenderedPaper) -> Result<Vec<Vec<u8>>, BrowserError> {
        let width = i64::from(paper.page_width_px);
        self.set_viewport(width, INITIAL_VIEWPORT_HEIGHT).await?;
        self.executor.page().set_content(paper.html.as_str()).await?;

        if !self.executor.wait_until("window.__mathReady", self.math_wait).await? {
            warn!("⚠️ 公式渲染未在 {:?} 内完成，按当前状态截图", self.math_wait);
        }

        let content_height: f64 = self
            .executor
            .eval_as("Math.ceil(document.documentElement.scrollHeight)")
            .await?;
        let height = (content_height as i64).max(1);
        self.set_viewport(width, height).await?;

        let spans = tile_spans(height, self.max_tile_height());
        debug!("版面尺寸: {}x{} (css px), 分 {} 段截图", width, height, spans.len());

        let mut tiles = Vec::with_capacity(spans.len());
        for (top, tile_height) in spans {
            let clip = Viewport {
                x: 0.0,
                y: top as f64,
                width: width as f64,
                height: tile_height as f64,
                scale: 1.0,
            };
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .clip(clip)
                .capture_beyond_viewport(true)
                .full_page(false)
                .omit_background(false)
                .build();
            tiles.push(self.executor.page().screenshot(params).await?);
        }
        Ok(tiles)
    }
}

/// 把总高度按最大段高切开，返回每段的（起点, 高度）
fn tile_spans(total_height: i64, max_tile_height: i64) -> Vec<(i64, i64)> {
    let step = max_tile_height.max(1);
    let mut spans = Vec::new();
    let mut top = 0;
    while top < total_height {
        spans.push((top, step.min(total_height - top)));
        top += step;
    }
    spans
}

impl Rasterizer for ChromeRasterizer {
    async fn rasterize(&self, paper: &RenderedPaper) -> Result<Vec<u8>, ExportError> {
        let mut tiles = self.capture_tiles(paper).await?;
        let png = match tiles.len() {
            1 => tiles.remove(0),
            _ => stitch_vertical(&tiles)?,
        };
        debug!("截图完成: {} 字节", png.len());
        Ok(png)
    }
}

//! 位图到页面的换算
//!
//! 页面宽度固定为标准纸张宽度，高度按位图宽高比推算，不裁剪不拉伸。

use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// A4 宽度（pt）
pub const A4_WIDTH_PT: f64 = 595.28;
/// A4 高度（pt）
pub const A4_HEIGHT_PT: f64 = 841.89;

/// 分页方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaginationMode {
    /// 整张位图放在一页上，页高随内容增长
    #[default]
    #[serde(rename = "single")]
    SingleImage,
    /// 按 A4 比例切成多页，最后一页补白
    #[serde(rename = "paged")]
    Paged,
}

/// 解码后的位图
pub struct Bitmap {
    png: Vec<u8>,
    image: DynamicImage,
}

impl Bitmap {
    pub fn from_png(png: Vec<u8>) -> Result<Self, ExportError> {
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ExportError::InvalidBitmap {
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(Self { png, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 一页的内容
#[derive(Debug, Clone, PartialEq)]
pub struct PageSegment {
    pub png: Vec<u8>,
    pub width_pt: f64,
    pub height_pt: f64,
}

/// 按宽高比推算页高
pub fn page_height_pt(bitmap_width: u32, bitmap_height: u32, page_width_pt: f64) -> f64 {
    f64::from(bitmap_height) * page_width_pt / f64::from(bitmap_width)
}

/// 把位图排成页面
pub fn layout_pages(
    bitmap: Bitmap,
    page_width_pt: f64,
    mode: PaginationMode,
) -> Result<Vec<PageSegment>, ExportError> {
    let full_height_pt = page_height_pt(bitmap.width(), bitmap.height(), page_width_pt);
    let sheet_height_pt = page_width_pt * A4_HEIGHT_PT / A4_WIDTH_PT;

    if mode == PaginationMode::SingleImage || full_height_pt <= sheet_height_pt {
        return Ok(vec![PageSegment {
            png: bitmap.png,
            width_pt: page_width_pt,
            height_pt: full_height_pt,
        }]);
    }

    let width = bitmap.width();
    let slice_px = ((f64::from(width) * A4_HEIGHT_PT / A4_WIDTH_PT).round() as u32).max(1);
    let white = Rgba([255, 255, 255, 255]);

    let mut pages = Vec::new();
    let mut top = 0;
    while top < bitmap.height() {
        let rows = slice_px.min(bitmap.height() - top);
        let slice = bitmap.image.crop_imm(0, top, width, rows);
        let mut canvas = RgbaImage::from_pixel(width, slice_px, white);
        imageops::overlay(&mut canvas, &slice.to_rgba8(), 0, 0);

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        pages.push(PageSegment {
            png,
            width_pt: page_width_pt,
            height_pt: sheet_height_pt,
        });
        top += rows;
    }
    Ok(pages)
}

/// 把多段截图自上而下拼成一张位图
pub fn stitch_vertical(tiles: &[Vec<u8>]) -> Result<Vec<u8>, ExportError> {
    let images = tiles
        .iter()
        .map(|png| Bitmap::from_png(png.clone()).map(|bitmap| bitmap.image.to_rgba8()))
        .collect::<Result<Vec<_>, _>>()?;

    let width = images.iter().map(|img| img.width()).max().unwrap_or(0);
    let height: u32 = images.iter().map(|img| img.height()).sum();
    if width == 0 || height == 0 {
        return Err(ExportError::InvalidBitmap { width, height });
    }

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut top = 0;
    for img in &images {
        imageops::replace(&mut canvas, img, 0, i64::from(top));
        top += img.height();
    }

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_height_preserves_aspect_ratio() {
        // 794px 页宽 * 2 倍采样
        let h = page_height_pt(1588, 4000, A4_WIDTH_PT);
        assert!((h - 4000.0 * 595.28 / 1588.0).abs() < 1e-9);
        assert!((page_height_pt(100, 100, 72.0) - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_image_keeps_original_bitmap() {
        let bytes = png(100, 500);
        let pages = layout_pages(
            Bitmap::from_png(bytes.clone()).unwrap(),
            A4_WIDTH_PT,
            PaginationMode::SingleImage,
        )
        .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].png, bytes);
        assert!((pages[0].height_pt - 5.0 * A4_WIDTH_PT).abs() < 1e-9);
    }

    #[test]
    fn test_paged_slices_and_pads_last_page() {
        // 100px 宽 → 每页 141px，300px 高切成 3 页
        let pages = layout_pages(
            Bitmap::from_png(png(100, 300)).unwrap(),
            A4_WIDTH_PT,
            PaginationMode::Paged,
        )
        .unwrap();
        assert_eq!(pages.len(), 3);

        let last = image::load_from_memory(&pages[2].png).unwrap().to_rgba8();
        assert_eq!(last.dimensions(), (100, 141));
        assert_eq!(last.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(last.get_pixel(0, 140), &Rgba([255, 255, 255, 255]));
        for page in &pages {
            assert!((page.height_pt - A4_HEIGHT_PT).abs() < 1e-6);
        }
    }

    #[test]
    fn test_short_content_stays_single_page_when_paged() {
        let pages = layout_pages(
            Bitmap::from_png(png(100, 50)).unwrap(),
            A4_WIDTH_PT,
            PaginationMode::Paged,
        )
        .unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_stitch_stacks_tiles_in_order() {
        let white = {
            let img = RgbaImage::from_pixel(100, 30, Rgba([255, 255, 255, 255]));
            let mut bytes = Vec::new();
            DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .unwrap();
            bytes
        };
        let stitched = stitch_vertical(&[png(100, 40), white, png(100, 20)]).unwrap();
        let img = image::load_from_memory(&stitched).unwrap().to_rgba8();

        assert_eq!(img.dimensions(), (100, 90));
        assert_eq!(img.get_pixel(0, 39), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(0, 40), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(0, 69), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(0, 70), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_stitch_without_tiles_is_invalid() {
        assert!(matches!(
            stitch_vertical(&[]),
            Err(ExportError::InvalidBitmap { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        assert!(matches!(
            Bitmap::from_png(b"not a png".to_vec()),
            Err(ExportError::Bitmap(_))
        ));
    }
}

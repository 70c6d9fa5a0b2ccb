//! 试卷导出

pub mod geometry;
pub mod packager;
pub mod pipeline;
pub mod rasterizer;
pub mod sink;

pub use geometry::{PageSegment, PaginationMode, A4_HEIGHT_PT, A4_WIDTH_PT};
pub use packager::{ChromePdfPackager, DocumentPackager};
pub use pipeline::{ExportPipeline, ExportReport, ExportState};
pub use rasterizer::{ChromeRasterizer, Rasterizer};
pub use sink::{DocumentSink, FileSink};

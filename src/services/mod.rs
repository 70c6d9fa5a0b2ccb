pub mod catalog;
pub mod export;
pub mod notice;
pub mod render;
pub mod selection;
pub mod visibility;

pub use catalog::{
    admin_listing, AdminFacets, CatalogSnapshot, CatalogStore, CatalogView, VisibleCatalog,
};
pub use export::{ExportPipeline, ExportReport, ExportState, PaginationMode};
pub use notice::Notice;
pub use render::{PaperRenderer, PaperSummary, RenderedPaper};
pub use selection::{SelectionChange, SelectionStore};
pub use visibility::{is_question_visible, is_resource_visible, DisplayFilter};

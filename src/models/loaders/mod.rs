pub mod bulk_parser;
pub mod toml_loader;

pub use bulk_parser::{parse_bulk_questions, BulkDefaults, ParseReport, SkippedBlock};
pub use toml_loader::{load_catalog_file, load_catalog_folder, load_viewer_profile, CatalogFile};

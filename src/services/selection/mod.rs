pub mod backend;
pub mod draft;
pub mod store;

pub use backend::{DraftBackend, FsDraftBackend, MemDraftBackend};
pub use draft::{PaperDraft, SelectionEntry};
pub use store::{list_drafts, SelectionChange, SelectionStore};

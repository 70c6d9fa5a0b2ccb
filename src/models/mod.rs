pub mod loaders;
pub mod paper;
pub mod question;
pub mod subject;
pub mod viewer;

pub use loaders::{load_catalog_folder, load_viewer_profile, CatalogFile};
pub use paper::PaperMetadata;
pub use question::{option_letter, Answer, Difficulty, LetterCase, Question, QuestionKind, Resource};
pub use subject::Subject;
pub use viewer::{Entitlement, Role, SubscriptionStatus, Viewer, ViewerIdentity, ViewerProfile};

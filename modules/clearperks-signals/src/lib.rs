pub mod category;
pub mod extractor;
pub mod feed;
pub mod ingest;
pub mod scoring;
pub mod store;

pub use category::{derive_category, derive_urgency, derive_view, is_deadline_eligible, ContentView};
pub use extractor::{notification_category, FixedJitter, Jitter, RandomJitter, TagSignalExtractor};
pub use ingest::{IngestRequest, Ingestor};
pub use scoring::RelevanceScorer;
pub use store::{ContentStore, InMemoryContentStore};

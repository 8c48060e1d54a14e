//! Resolution pipeline for scraped bibliographic mentions: checksum
//! validation, cached tiered lookup, title similarity, and a closed
//! quarantine taxonomy, driven batch-wise over a mention stream.

pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod isbn;
pub mod pipeline;
pub mod resolver;
pub mod similarity;
pub mod stats;

pub use cache::MetadataCache;
pub use catalog::BookCatalog;
pub use classifier::{Decision, SIMILARITY_THRESHOLD};
pub use pipeline::{Pipeline, RunReport};
pub use resolver::Resolver;
pub use stats::RunStats;

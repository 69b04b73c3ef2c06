pub mod chunker;
pub mod core;
pub mod loader;

pub use chunker::Chunker;
pub use core::{BuildReport, Indexer};
pub use loader::Loader;

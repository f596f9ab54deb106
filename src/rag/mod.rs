pub mod chroma;
pub mod context;
pub mod prompt;
pub mod retry;
pub mod store;

pub use chroma::ChromaStore;
pub use context::{ContextAssembler, RagContext, SourceRef};
pub use retry::RetryPolicy;
pub use store::{DocumentStore, RetrievedMatch, StoredDocument};

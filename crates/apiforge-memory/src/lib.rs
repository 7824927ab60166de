//! In-memory vector storage and the per-run embedding index.

pub mod error;
pub mod in_memory_store;
pub mod index;
pub mod vector_store;

pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use index::{BuildReport, DocIndex, IndexDoc};
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

//! Pipeline pieces: dataset loading, retrieval and generation tools, the
//! reasoning agent, the output writer, and configuration.

pub mod agent;
pub mod config;
pub mod dataset;
pub mod output;
pub mod tools;

pub use agent::{Agent, QueryOutcome};
pub use dataset::ApiEntry;
pub use tools::generator::{GeneratedCode, Generator};
pub use tools::retriever::{RetrievedEntry, Retriever};

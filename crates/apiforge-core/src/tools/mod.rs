pub mod generator;
pub mod retriever;

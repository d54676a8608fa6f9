pub mod client;

pub use client::{RetrievalClient, RetrievedChunk, WeaviateClient};

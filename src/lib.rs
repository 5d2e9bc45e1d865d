//! Retrieval-augmented generation for chat agents.
//!
//! Uploaded documents are chunked, embedded and stored per agent; at chat time
//! the most similar chunks are retrieved and folded into the prompt.

pub mod core;
pub mod rag;
pub mod state;

pub use crate::core::errors::RagError;

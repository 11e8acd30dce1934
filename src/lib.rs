//! Retrieval-bounded question answering.
//!
//! Documents are chunked, embedded and indexed; questions are answered only
//! from passages that clear a relevance threshold, and refused otherwise.

pub mod application;
pub mod domain;
pub mod infrastructure;

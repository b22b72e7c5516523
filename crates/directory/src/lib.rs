//! `orgscope-directory`: org hierarchy retrieval from the directory service.
//!
//! Strict response schema at the boundary, one traversal per access level,
//! and an immutable [`HierarchySnapshot`] as the result.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod snapshot;
pub mod traverse;
pub mod wire;

pub use client::{DirectoryClient, HttpDirectoryClient};
pub use error::HierarchyFetchError;
pub use fetcher::TeamHierarchyFetcher;
pub use snapshot::HierarchySnapshot;

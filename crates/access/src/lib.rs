//! `orgscope-access`: hierarchical data scoping for one session.
//!
//! [`DataScope`] resolves the principal's access level, keeps the relevant
//! slice of the org tree in a per-session [`HierarchyCache`], and turns it
//! into a [`ScopeQuery`] for entity APIs or a [`ScopePredicate`] for records
//! already in hand.

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod query;
pub mod session;

pub use builder::{ScopeBuilder, ScopePredicate};
pub use cache::{CacheState, HierarchyCache};
pub use config::{ConfigError, ScopeConfig};
pub use error::ScopeError;
pub use filters::{CHATS, EntityFilters, FieldExtractor, LEADS, ScopeFields};
pub use query::ScopeQuery;
pub use session::DataScope;

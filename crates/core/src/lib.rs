//! `orgscope-core`: identifier and error building blocks.
//!
//! This crate contains **pure domain** primitives (no IO, no async).

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{DepartmentId, TeamId, TenantId, UserId};

//! `orgscope-auth`: principals and role resolution.
//!
//! This crate does not authenticate anyone; it models the already
//! authenticated principal and maps its role onto an access level.

pub mod principal;
pub mod roles;

pub use principal::{AuthContext, Principal, StaticAuthContext};
pub use roles::{AccessLevel, Role, resolve};

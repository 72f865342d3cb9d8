//! Feature Restriction Core Library
//!
//! Domain types, error taxonomy, configuration, and the storage traits
//! that the rest of the workspace builds on.

pub mod config;
pub mod error;
pub mod repository;
pub mod types;

pub use error::{Error, Result};

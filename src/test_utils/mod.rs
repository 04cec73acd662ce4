//! Shared test utilities: document fixtures and in-memory collaborators.

pub mod doubles;
pub mod fixtures;
pub mod logging;

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod generator;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod publish;
pub mod refiner;
pub mod research;
pub mod sandbox;
pub mod storage;
pub mod summary;
pub mod test_utils;
pub mod validator;

pub use error::{ForgeError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Tunemart Common Library
//!
//! Shared code for the Tunemart client crates:
//! - Common error type
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Root folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};

//! # LabelDeck Common Library
//!
//! Shared code for the LabelDeck services including:
//! - Common error type
//! - Configuration loading (TOML + environment)
//! - Logging initialisation
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};

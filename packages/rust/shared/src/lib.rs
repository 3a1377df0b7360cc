//! Shared types, error model, and configuration for refconv.
//!
//! This crate is the foundation depended on by all other refconv crates.
//! It provides:
//! - [`RefConvError`]: the unified error type
//! - [`SourceFile`]: one named blob read from the documentation archive
//! - Configuration ([`AppConfig`], [`ConvertSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConvertSettings, OutputConfig, RenderConfig, SourceConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{RefConvError, Result};
pub use types::SourceFile;

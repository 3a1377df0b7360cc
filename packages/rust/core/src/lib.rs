//! Pipeline orchestration for refconv.
//!
//! This crate ties together revision discovery, archive reading, XML
//! conversion and catalog writing into one end-to-end run.

pub mod pipeline;

pub use pipeline::{ProgressReporter, RunOutcome, SilentProgress, run};

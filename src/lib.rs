//! manim-provision library exports.
//!
//! The binary in `main.rs` is a thin CLI over these modules; they are public
//! so integration tests can exercise the pipeline internals directly.

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod manifest;
pub mod pathsearch;
pub mod preflight;
pub mod process;
pub mod scaffold;
pub mod stages;
pub mod timing;

//! Configuration module for smartio
//!
//! Provides CLI arguments, the JSON settings file and runtime defaults.

mod settings;

pub use settings::*;

//! Stream copy module
//!
//! Copies bytes between paths and open handles with optional length and
//! source offset bounds, using `copy_file_range` where the kernel allows it.

mod copier;
mod endpoint;

pub use copier::*;
pub use endpoint::Endpoint;

//! CLI command implementations
//!
//! Handles all command-line interface operations:
//! - add / remove: the content operations, answered as JSON
//! - status, search, show: read-only views of the index
//! - reconcile: content store and symbol graph consistency

mod commands;
mod root;

pub use commands::*;
pub use root::*;

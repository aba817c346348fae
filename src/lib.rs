//! codevault: Content-addressed code index
//!
//! Stores source files by the SHA-256 of their bytes and keeps a symbol
//! graph of their top-level declarations in SQLite. Identical content is
//! stored and parsed once, whatever path it was added from. Uses
//! tree-sitter for parsing TypeScript and JavaScript.
//!
//! ## Layout of a vault root
//!
//! - `files/<hh>/<rest>.src` - source bytes, sharded by the first two hex
//!   characters of the hash
//! - `files/<hh>/<rest>.ast.json` - serialized declaration tree
//! - `index.db` - source units, symbols, dependency edges, references
//! - `semantic-index/` - reserved for a semantic search backend
//! - `config.toml` - optional settings
//!
//! ## Example
//!
//! ```no_run
//! use codevault::{AddOptions, Vault, VaultConfig};
//!
//! let mut vault = Vault::open(VaultConfig::new("/tmp/vault"))?;
//! let report = vault.add("src".as_ref(), &AddOptions::default())?;
//! for (path, outcome) in &report.outcomes {
//!     println!("{} -> {}", path.display(), outcome.hash());
//! }
//! # Ok::<(), codevault::VaultError>(())
//! ```

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extraction;
pub mod inspect;
pub mod pipeline;
pub mod selection;
pub mod types;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use inspect::{inspect, InspectReport, InspectedSymbol};
pub use pipeline::{AddReport, FileError, FileOutcome, ReconcileReport, Vault};
pub use types::{
    AddOptions, AddResponse, DependencyEdge, FileSelectionSpec, RemoveResponse, SourceUnit,
    Symbol, SymbolKind, SymbolReference, VaultStats,
};

#![forbid(unsafe_code)]

//! Schema-driven JSON tree model.
//!
//! A document is a JSON object whose `_headers_` descriptor names the columns
//! (`"Name:name:0,Value:value:1"`) and whose `_children_` arrays nest rows.
//! [`TreeDocument`] loads such a document into a node arena, resolves
//! row/column indexes under a visibility policy, applies edits and saves the
//! tree back to JSON. [`FilterView`] and [`search`] provide filtered and
//! searched projections on top.
//!
//! Enable the `tracing` feature for load spans and row/fetch/search events,
//! and `regex-search` for regular-expression search patterns.

pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod markers;
pub mod node;
pub mod policy;
pub mod presentation;
pub mod purge;
pub mod schema;

pub use config::DocumentConfig;
pub use document::{CellData, IndentMode, ModelEvent, ModelIndex, SaveOptions, TreeDocument};
pub use error::{ConfigError, LoadError, MutationError, SaveError};
pub use filter::{FilterView, SearchHit, SearchPattern, Selection, find_matches, search};
pub use node::{NodeArena, NodeId, TreeNode, Validity};
pub use policy::{ItemFlags, SpecialFlags};
pub use presentation::{ColorToken, FontToken, Overrides, Presentation, Role};
pub use purge::PurgeSpec;
pub use schema::{ColumnDef, HeaderSchema, SchemaError};

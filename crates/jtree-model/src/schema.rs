//! Column schema parsed from a `_headers_` descriptor.
//!
//! A descriptor is a comma separated list of `name:tag:idx[:draw]` entries:
//!
//! ```
//! use jtree_model::schema::HeaderSchema;
//!
//! let schema = HeaderSchema::parse("Name:name:0,Value:value:1,Action:btn:2:draw").unwrap();
//! assert_eq!(schema.len(), 3);
//! assert_eq!(schema.by_tag("value").unwrap().index, 1);
//! assert!(schema.by_index(2).unwrap().draw_only);
//! ```
//!
//! Names and tags share one key space; a key naming two different columns
//! rejects the descriptor, so every lookup lands on a single definition.

use ahash::AHashMap;
use thiserror::Error;

/// One column of the tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Header text shown to the user.
    pub display_name: String,
    /// JSON field the column reads and writes.
    pub tag: String,
    pub index: usize,
    /// The cell has no stored value; it is drawn from an instruction held in
    /// another field (e.g. `_widget_:<tag>`).
    pub draw_only: bool,
}

/// Why a descriptor was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("empty header descriptor")]
    Empty,

    /// Entry with fewer than three `:` separated parts.
    #[error("malformed header entry: {entry:?}")]
    MalformedEntry { entry: String },

    /// Third part is not a non-negative integer.
    #[error("invalid column index in entry: {entry:?}")]
    InvalidIndex { entry: String },

    #[error("duplicate column index: {index}")]
    DuplicateIndex { index: usize },

    /// A name or tag already belongs to another column.
    #[error("header key {key:?} names more than one column")]
    AmbiguousKey { key: String },
}

/// Immutable column table. All-or-nothing: one bad entry rejects the descriptor.
#[derive(Debug, Clone)]
pub struct HeaderSchema {
    columns: Vec<ColumnDef>,
    lookup: AHashMap<String, usize>,
}

// The lookup map is derived from `columns`.
impl PartialEq for HeaderSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for HeaderSchema {}

impl HeaderSchema {
    pub fn parse(descriptor: &str) -> Result<Self, SchemaError> {
        if descriptor.trim().is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut columns: Vec<ColumnDef> = Vec::new();
        for entry in descriptor.split(',') {
            let parts: Vec<&str> = entry.split(':').collect();
            if parts.len() < 3 {
                return Err(SchemaError::MalformedEntry {
                    entry: entry.to_string(),
                });
            }
            let index = parts[2]
                .trim()
                .parse::<usize>()
                .map_err(|_| SchemaError::InvalidIndex {
                    entry: entry.to_string(),
                })?;
            if columns.iter().any(|c| c.index == index) {
                return Err(SchemaError::DuplicateIndex { index });
            }
            let draw_only = parts
                .get(3)
                .is_some_and(|opt| opt.trim().eq_ignore_ascii_case("draw"));
            columns.push(ColumnDef {
                display_name: parts[0].to_string(),
                tag: parts[1].to_string(),
                index,
                draw_only,
            });
        }

        columns.sort_by_key(|c| c.index);
        let mut lookup: AHashMap<String, usize> = AHashMap::with_capacity(columns.len() * 2);
        for (slot, column) in columns.iter().enumerate() {
            for key in [&column.display_name, &column.tag] {
                match lookup.get(key.as_str()) {
                    Some(&owner) if owner != slot => {
                        return Err(SchemaError::AmbiguousKey { key: key.clone() });
                    }
                    Some(_) => {}
                    None => {
                        lookup.insert(key.clone(), slot);
                    }
                }
            }
        }

        Ok(Self { columns, lookup })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns ordered by index.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&ColumnDef> {
        self.columns
            .binary_search_by_key(&index, |c| c.index)
            .ok()
            .map(|slot| &self.columns[slot])
    }

    #[must_use]
    pub fn by_tag(&self, tag: &str) -> Option<&ColumnDef> {
        self.get(tag)
    }

    /// Same map as [`by_tag`](Self::by_tag); names and tags share one key space.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ColumnDef> {
        self.get(name)
    }

    /// Tag of the column at `index`.
    #[must_use]
    pub fn tag_of(&self, index: usize) -> Option<&str> {
        self.by_index(index).map(|c| c.tag.as_str())
    }

    fn get(&self, key: &str) -> Option<&ColumnDef> {
        self.lookup.get(key).map(|&slot| &self.columns[slot])
    }
}

//! The tree document: load/save, index resolution, policy and mutation.
//!
//! A document owns a synthetic, never-visible root node that only carries the
//! `_headers_` descriptor. The loaded JSON object becomes that root's single
//! child and is the visible top-level row.
//!
//! ```
//! use jtree_model::document::TreeDocument;
//!
//! let mut doc = TreeDocument::new();
//! doc.load(br#"{"version":1,"_headers_":"Name:name:0,Value:value:1",
//!              "name":"root","value":"x","_children_":[{"name":"a","value":"1"}]}"#)
//!     .unwrap();
//!
//! let top = doc.index(0, 0, None).unwrap();
//! assert_eq!(doc.row_count(Some(top)), 1);
//! let child = doc.index(0, 1, Some(top)).unwrap();
//! assert_eq!(doc.value(child), Some(&serde_json::json!("1")));
//! ```
//!
//! Mutations never emit callbacks; they append [`ModelEvent`]s that the owner
//! drains with [`TreeDocument::take_events`]. Structural changes are bracketed
//! by about-to / done pairs carrying the affected row range.

use std::io::{Read, Write};
use std::path::Path;

use serde_json::{Map, Value};
#[cfg(feature = "tracing")]
use web_time::Instant;

use crate::config::DocumentConfig;
use crate::error::{LoadError, MutationError, SaveError};
use crate::markers::{self, BLOB, HEADERS, HIDE, READONLY, TEMPLATE, WIDGET};
use crate::node::{NodeArena, NodeId, TreeNode};
use crate::policy::{ItemFlags, SpecialFlags};
use crate::presentation::{ColorToken, FontToken, Presentation, Role};
use crate::purge::PurgeSpec;
use crate::schema::HeaderSchema;

/// Address of one cell: a node and a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    row: usize,
    column: usize,
    node: NodeId,
}

impl ModelIndex {
    #[must_use]
    pub fn row(&self) -> usize {
        self.row
    }

    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Change notifications for a consuming view.
///
/// `parent` is `None` for top-level rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    DataChanged {
        index: ModelIndex,
    },
    RowsAboutToBeInserted {
        parent: Option<ModelIndex>,
        first: usize,
        last: usize,
    },
    RowsInserted {
        parent: Option<ModelIndex>,
        first: usize,
        last: usize,
    },
    RowsAboutToBeRemoved {
        parent: Option<ModelIndex>,
        first: usize,
        last: usize,
    },
    RowsRemoved {
        parent: Option<ModelIndex>,
        first: usize,
        last: usize,
    },
    LayoutAboutToBeChanged,
    LayoutChanged,
    ModelAboutToBeReset,
    ModelReset,
}

/// Result of [`TreeDocument::data`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellData<'a> {
    Value(&'a Value),
    Color(&'a ColorToken),
    Font(&'a FontToken),
}

/// Output formatting for serialized documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndentMode {
    #[default]
    Compact,
    Pretty,
}

/// Options for [`TreeDocument::save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Purge rules; the document's own purge spec applies when `None`.
    pub purge: Option<PurgeSpec>,
    /// Remove descriptive marker keys (`_widget_`, `_hide_`, ...).
    pub strip_descriptive: bool,
    /// Extra top-level keys merged into the output, e.g. `version`.
    pub additional: Map<String, Value>,
}

impl SaveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_purge(mut self, purge: PurgeSpec) -> Self {
        self.purge = Some(purge);
        self
    }

    #[must_use]
    pub fn strip_descriptive(mut self, strip: bool) -> Self {
        self.strip_descriptive = strip;
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional.insert(key.into(), value);
        self
    }
}

/// A JSON document mapped onto a schema-driven tree.
#[derive(Debug, Clone)]
pub struct TreeDocument {
    config: DocumentConfig,
    arena: NodeArena,
    /// Synthetic root; `None` while the document is empty.
    root: Option<NodeId>,
    flags: SpecialFlags,
    purge: PurgeSpec,
    presentation: Presentation,
    error: Option<LoadError>,
    events: Vec<ModelEvent>,
}

impl Default for TreeDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DocumentConfig::default())
    }

    #[must_use]
    pub fn with_config(config: DocumentConfig) -> Self {
        let flags = config.special_flags;
        Self {
            config,
            arena: NodeArena::new(),
            root: None,
            flags,
            purge: PurgeSpec::new(),
            presentation: Presentation::default(),
            error: None,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    #[must_use]
    pub fn max_supported_version(&self) -> i64 {
        self.config.max_supported_version
    }

    /// Error retained from the last failed load.
    #[must_use]
    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id)
    }

    /// Direct node access for override edits. Structural changes must go
    /// through the row APIs so views get notified.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.arena.get_mut(id)
    }

    /// The synthetic invisible root.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The visible top-level node built from the loaded object.
    #[must_use]
    pub fn top_level(&self) -> Option<NodeId> {
        self.root
            .and_then(|root| self.arena.get(root))
            .and_then(|root| root.child(0))
    }

    #[must_use]
    pub fn schema(&self) -> Option<&HeaderSchema> {
        self.arena.schema().map(|schema| &**schema)
    }

    /// Nodes reachable below the synthetic root.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.root.map_or(0, |root| self.arena.total_count(root))
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut Presentation {
        &mut self.presentation
    }

    #[must_use]
    pub fn purge_spec(&self) -> &PurgeSpec {
        &self.purge
    }

    /// Default purge rules for saves that do not carry their own.
    pub fn set_purge_spec(&mut self, purge: PurgeSpec) {
        self.purge = purge;
    }

    #[must_use]
    pub fn special_flags(&self) -> SpecialFlags {
        self.flags
    }

    /// Change policy; visibility of every row may change, so the update is
    /// bracketed by layout notifications.
    pub fn set_special_flags(&mut self, flags: SpecialFlags) {
        self.events.push(ModelEvent::LayoutAboutToBeChanged);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "jtree.policy",
            from = self.flags.bits(),
            to = flags.bits()
        );
        self.flags = flags;
        self.events.push(ModelEvent::LayoutChanged);
    }

    /// Pending notifications, oldest first.
    #[must_use]
    pub fn events(&self) -> &[ModelEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop the tree, the retained error and the purge list; restore
    /// configured policy.
    pub fn clear(&mut self) {
        self.events.push(ModelEvent::ModelAboutToBeReset);
        self.reset_state();
        self.error = None;
        self.events.push(ModelEvent::ModelReset);
    }

    fn reset_state(&mut self) {
        self.arena = NodeArena::new();
        self.root = None;
        self.purge = PurgeSpec::new();
        self.flags = self.config.special_flags;
    }

    // ── load ─────────────────────────────────────────────────────────────

    pub fn load(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return self.reject(LoadError::EmptyInput);
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => self.load_value(value),
            Err(err) => self.reject(LoadError::from_json(&err)),
        }
    }

    pub fn load_reader<R: Read>(&mut self, mut reader: R) -> Result<(), LoadError> {
        let mut buf = Vec::new();
        if let Err(err) = reader.read_to_end(&mut buf) {
            return self.reject(LoadError::Io {
                message: err.to_string(),
            });
        }
        self.load(&buf)
    }

    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        match std::fs::read(path.as_ref()) {
            Ok(buf) => self.load(&buf),
            Err(err) => self.reject(LoadError::Io {
                message: format!("{}: {err}", path.as_ref().display()),
            }),
        }
    }

    /// Build the tree from an already parsed value.
    pub fn load_value(&mut self, value: Value) -> Result<(), LoadError> {
        #[cfg(feature = "tracing")]
        let load_start = Instant::now();
        #[cfg(feature = "tracing")]
        let load_span = tracing::debug_span!(
            "jtree.load",
            nodes = tracing::field::Empty,
            load_duration_us = tracing::field::Empty,
        );
        #[cfg(feature = "tracing")]
        let _load_guard = load_span.enter();

        self.events.push(ModelEvent::ModelAboutToBeReset);
        self.reset_state();
        self.error = None;
        let result = self.build(value);
        if let Err(err) = &result {
            self.reset_state();
            self.error = Some(err.clone());
            #[cfg(feature = "tracing")]
            tracing::warn!(message = "jtree.load.rejected", error = %err);
        }
        self.events.push(ModelEvent::ModelReset);

        #[cfg(feature = "tracing")]
        {
            load_span.record("nodes", self.total_count() as u64);
            load_span.record(
                "load_duration_us",
                load_start.elapsed().as_micros().min(u128::from(u64::MAX)) as u64,
            );
        }
        result
    }

    fn reject(&mut self, err: LoadError) -> Result<(), LoadError> {
        self.events.push(ModelEvent::ModelAboutToBeReset);
        self.reset_state();
        self.error = Some(err.clone());
        self.events.push(ModelEvent::ModelReset);
        #[cfg(feature = "tracing")]
        tracing::warn!(message = "jtree.load.rejected", error = %err);
        Err(err)
    }

    fn build(&mut self, value: Value) -> Result<(), LoadError> {
        let map = match value {
            Value::Object(map) if map.is_empty() => return Err(LoadError::EmptyInput),
            Value::Object(map) => map,
            _ => return Err(LoadError::InvalidMap { map: Map::new() }),
        };

        let version = self.json_version(&map).ok_or_else(|| LoadError::MissingVersion {
            key: self.config.version_key.clone(),
        })?;
        if version > self.config.max_supported_version {
            return Err(LoadError::UnsupportedVersion {
                found: version,
                max: self.config.max_supported_version,
            });
        }

        let map = match map.get(BLOB) {
            Some(Value::Object(blob)) if !blob.is_empty() => blob.clone(),
            _ => map,
        };

        let descriptor = match map.get(HEADERS) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(LoadError::MissingOrInvalidHeaders { map }),
        };

        let mut header_map = Map::new();
        header_map.insert(HEADERS.to_string(), Value::String(descriptor));
        let root = self.arena.create(None, header_map, false);
        if let Some(err) = self.root_error(root) {
            return Err(err);
        }

        let top = self.arena.create(Some(root), map, false);
        if !self.arena.get(top).is_some_and(TreeNode::is_valid) {
            let map = self
                .arena
                .get(top)
                .and_then(TreeNode::invalid_map)
                .cloned()
                .unwrap_or_default();
            return Err(LoadError::InvalidMap { map });
        }
        self.arena.append_child(root, top);
        self.root = Some(root);
        Ok(())
    }

    fn root_error(&self, root: NodeId) -> Option<LoadError> {
        let node = self.arena.get(root)?;
        if node.is_valid() {
            return None;
        }
        Some(LoadError::MissingOrInvalidHeaders {
            map: node.invalid_map().cloned().unwrap_or_default(),
        })
    }

    /// The document version, read from the configured key. Integral numbers
    /// and numeric strings are accepted.
    #[must_use]
    pub fn json_version(&self, map: &Map<String, Value>) -> Option<i64> {
        match map.get(&self.config.version_key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    // ── save ─────────────────────────────────────────────────────────────

    /// Rebuild the JSON object of the visible tree.
    ///
    /// When a purge rule drops the top-level node the result holds only
    /// `additional`.
    pub fn save(&self, options: &SaveOptions) -> Result<Map<String, Value>, SaveError> {
        let top = self.top_level().ok_or(SaveError::EmptyDocument)?;
        let purge = options.purge.as_ref().unwrap_or(&self.purge);
        let mut map = self
            .arena
            .to_map(top, purge, options.strip_descriptive)
            .unwrap_or_default();
        for (key, value) in &options.additional {
            map.insert(key.clone(), value.clone());
        }
        Ok(map)
    }

    pub fn save_bytes(
        &self,
        options: &SaveOptions,
        indent: IndentMode,
    ) -> Result<Vec<u8>, SaveError> {
        let map = Value::Object(self.save(options)?);
        let buf = match indent {
            IndentMode::Compact => serde_json::to_vec(&map)?,
            IndentMode::Pretty => serde_json::to_vec_pretty(&map)?,
        };
        Ok(buf)
    }

    /// Serialize into `writer`. A writer that stops accepting bytes before the
    /// buffer is out is a short write. Returns the byte count written.
    pub fn save_to<W: Write>(
        &self,
        mut writer: W,
        options: &SaveOptions,
        indent: IndentMode,
    ) -> Result<usize, SaveError> {
        let buf = self.save_bytes(options, indent)?;
        let mut written = 0;
        while written < buf.len() {
            match writer.write(&buf[written..]) {
                Ok(0) => {
                    return Err(SaveError::ShortWrite {
                        requested: buf.len(),
                        written,
                    });
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        writer.flush()?;
        Ok(written)
    }

    pub fn save_path(
        &self,
        path: impl AsRef<Path>,
        options: &SaveOptions,
        indent: IndentMode,
    ) -> Result<usize, SaveError> {
        // Serialize before truncating the target.
        let buf = self.save_bytes(options, indent)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&buf)?;
        file.flush()?;
        Ok(buf.len())
    }

    // ── index resolution ─────────────────────────────────────────────────

    fn parent_node(&self, parent: Option<ModelIndex>) -> Option<NodeId> {
        match parent {
            Some(index) => self.arena.contains(index.node).then_some(index.node),
            None => self.root,
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.schema().map_or(0, HeaderSchema::len)
    }

    /// Display name of a column.
    #[must_use]
    pub fn header_data(&self, section: usize) -> Option<&str> {
        self.schema()?
            .by_index(section)
            .map(|column| column.display_name.as_str())
    }

    #[must_use]
    pub fn row_count(&self, parent: Option<ModelIndex>) -> usize {
        if parent.is_some_and(|p| p.column > 0) {
            return 0;
        }
        self.parent_node(parent)
            .and_then(|id| self.arena.get(id))
            .map_or(0, TreeNode::child_count)
    }

    #[must_use]
    pub fn has_children(&self, parent: Option<ModelIndex>) -> bool {
        self.parent_node(parent)
            .and_then(|id| self.arena.get(id))
            .is_some_and(TreeNode::has_children)
    }

    /// Whether the whole row of `node` is suppressed under the current policy.
    #[must_use]
    pub fn is_row_suppressed(&self, node: &TreeNode) -> bool {
        if node.has_read_only_marker() && self.flags.read_only_hides_row() {
            return true;
        }
        if markers::flag(node.fields(), TEMPLATE) {
            return true;
        }
        self.flags.contains(SpecialFlags::HONOR_HIDE) && markers::flag(node.fields(), HIDE)
    }

    /// Row rules plus the column-scoped `_hide_:<tag>` marker.
    #[must_use]
    pub fn is_cell_suppressed(&self, node: &TreeNode, tag: &str) -> bool {
        self.is_row_suppressed(node)
            || (self.flags.contains(SpecialFlags::HONOR_HIDE)
                && markers::flag(node.fields(), &markers::column_marker(HIDE, tag)))
    }

    /// Resolve a cell. Absent when out of range or suppressed by policy.
    #[must_use]
    pub fn index(
        &self,
        row: usize,
        column: usize,
        parent: Option<ModelIndex>,
    ) -> Option<ModelIndex> {
        if column >= self.column_count() || row >= self.row_count(parent) {
            return None;
        }
        let parent = self.arena.get(self.parent_node(parent)?)?;
        let id = parent.child(row)?;
        let node = self.arena.get(id)?;
        let tag = self.schema()?.tag_of(column)?;
        if self.is_cell_suppressed(node, tag) {
            return None;
        }
        Some(ModelIndex { row, column, node: id })
    }

    /// Parent cell (column 0) of `index`; `None` for top-level rows.
    #[must_use]
    pub fn parent(&self, index: ModelIndex) -> Option<ModelIndex> {
        let parent = self.arena.get(index.node)?.parent()?;
        if Some(parent) == self.root {
            return None;
        }
        Some(ModelIndex {
            row: self.arena.row(parent),
            column: 0,
            node: parent,
        })
    }

    /// Index of a node without policy checks; `None` for the synthetic root.
    #[must_use]
    pub fn index_of(&self, node: NodeId, column: usize) -> Option<ModelIndex> {
        if Some(node) == self.root || !self.arena.contains(node) {
            return None;
        }
        Some(ModelIndex {
            row: self.arena.row(node),
            column,
            node,
        })
    }

    fn cell(&self, index: ModelIndex) -> Option<(&TreeNode, &str)> {
        let node = self.arena.get(index.node)?;
        let tag = self.schema()?.tag_of(index.column)?;
        Some((node, tag))
    }

    /// JSON tag of the column at `index`.
    #[must_use]
    pub fn tag_at(&self, index: ModelIndex) -> Option<&str> {
        self.cell(index).map(|(_, tag)| tag)
    }

    // ── field access ─────────────────────────────────────────────────────

    /// Stored value of a cell; always `None` for draw-only columns.
    #[must_use]
    pub fn value(&self, index: ModelIndex) -> Option<&Value> {
        let (node, tag) = self.cell(index)?;
        if self
            .schema()?
            .by_index(index.column)
            .is_some_and(|c| c.draw_only)
        {
            return None;
        }
        node.field(tag)
    }

    #[must_use]
    pub fn foreground(&self, index: ModelIndex) -> Option<&ColorToken> {
        let (node, tag) = self.cell(index)?;
        self.presentation.resolve_foreground(node, tag, self.flags)
    }

    #[must_use]
    pub fn background(&self, index: ModelIndex) -> Option<&ColorToken> {
        let (node, tag) = self.cell(index)?;
        self.presentation.resolve_background(node, tag, self.flags)
    }

    #[must_use]
    pub fn font(&self, index: ModelIndex) -> Option<&FontToken> {
        let (node, tag) = self.cell(index)?;
        self.presentation.resolve_font(node, tag, self.flags)
    }

    #[must_use]
    pub fn data(&self, index: ModelIndex, role: Role) -> Option<CellData<'_>> {
        if role.is_value() {
            return self.value(index).map(CellData::Value);
        }
        match role {
            Role::Foreground => self.foreground(index).map(CellData::Color),
            Role::Background => self.background(index).map(CellData::Color),
            Role::Font => self.font(index).map(CellData::Font),
            Role::Display | Role::Edit | Role::ToolTip => None,
        }
    }

    /// Display text of a cell, empty when unset.
    #[must_use]
    pub fn text(&self, index: ModelIndex) -> String {
        self.cell(index)
            .map(|(node, tag)| node.text(tag))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn flags(&self, index: ModelIndex) -> ItemFlags {
        let mut flags = ItemFlags::default();
        let Some((node, tag)) = self.cell(index) else {
            return flags;
        };
        if self.flags.contains(SpecialFlags::HONOR_READ_ONLY)
            && markers::flag(node.fields(), &markers::column_marker(READONLY, tag))
        {
            flags.remove(ItemFlags::ENABLED);
        }
        if let Some(Value::String(widget)) = node.field(&markers::column_marker(WIDGET, tag)) {
            flags |= markers::widget_flags(widget);
        }
        flags
    }

    // ── mutation ─────────────────────────────────────────────────────────

    /// Write a cell. An object value replaces the node's whole content
    /// (fields and children); anything else is stored under the column tag.
    pub fn set_value(&mut self, index: ModelIndex, value: Value) -> bool {
        let Some(tag) = self.tag_at(index).map(str::to_owned) else {
            return false;
        };
        let stored = match value {
            Value::Object(map) => self.arena.from_map(index.node, map, false).is_ok(),
            other => self
                .arena
                .get_mut(index.node)
                .is_some_and(|node| node.set_field(tag, other)),
        };
        if stored {
            self.events.push(ModelEvent::DataChanged { index });
        }
        stored
    }

    pub fn insert_rows(&mut self, row: usize, count: usize, parent: Option<ModelIndex>) -> bool {
        self.try_insert_rows(row, count, parent).is_ok()
    }

    pub fn insert_row(&mut self, row: usize, parent: Option<ModelIndex>) -> bool {
        self.insert_rows(row, 1, parent)
    }

    /// Append `count` empty placeholder children under `parent`.
    ///
    /// Placeholders always go to the end; `row` must not exceed the current
    /// child count. Notifications carry the range actually appended.
    pub fn try_insert_rows(
        &mut self,
        row: usize,
        count: usize,
        parent: Option<ModelIndex>,
    ) -> Result<(), MutationError> {
        if count == 0 {
            return Err(MutationError::ZeroCount);
        }
        let parent_id = parent
            .map(|p| p.node)
            .filter(|&id| self.arena.contains(id))
            .ok_or(MutationError::UnresolvedParent)?;
        let len = self.arena.get(parent_id).map_or(0, TreeNode::child_count);
        let Some(end) = len.checked_add(count).filter(|_| row <= len) else {
            return Err(MutationError::RowOutOfRange { row, count, len });
        };

        let (first, last) = (len, end - 1);
        self.events.push(ModelEvent::RowsAboutToBeInserted { parent, first, last });
        for _ in 0..count {
            let child = self.arena.create(Some(parent_id), Map::new(), true);
            self.arena.append_child(parent_id, child);
        }
        self.events.push(ModelEvent::RowsInserted { parent, first, last });
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "jtree.rows", action = "insert", first, last);
        Ok(())
    }

    pub fn remove_rows(&mut self, row: usize, count: usize, parent: Option<ModelIndex>) -> bool {
        self.try_remove_rows(row, count, parent).is_ok()
    }

    pub fn remove_row(&mut self, row: usize, parent: Option<ModelIndex>) -> bool {
        self.remove_rows(row, 1, parent)
    }

    /// Remove children `[row, row + count)` of `parent` with their subtrees.
    pub fn try_remove_rows(
        &mut self,
        row: usize,
        count: usize,
        parent: Option<ModelIndex>,
    ) -> Result<(), MutationError> {
        if count == 0 {
            return Err(MutationError::ZeroCount);
        }
        let parent_id = parent
            .map(|p| p.node)
            .filter(|&id| self.arena.contains(id))
            .ok_or(MutationError::UnresolvedParent)?;
        let len = self.arena.get(parent_id).map_or(0, TreeNode::child_count);
        if row.checked_add(count).is_none_or(|end| end > len) {
            return Err(MutationError::RowOutOfRange { row, count, len });
        }

        let (first, last) = (row, row + count - 1);
        self.events.push(ModelEvent::RowsAboutToBeRemoved { parent, first, last });
        for _ in 0..count {
            if let Some(freed) = self.arena.remove_child(parent_id, row) {
                // `remove_child` only accounts for the detached node itself.
                self.arena
                    .adjust_total(parent_id, -(freed.saturating_sub(1) as isize));
            }
        }
        self.events.push(ModelEvent::RowsRemoved { parent, first, last });
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "jtree.rows", action = "remove", first, last);
        Ok(())
    }

    // ── incremental fetch ────────────────────────────────────────────────

    /// Whether `parent` still has children not yet revealed.
    #[must_use]
    pub fn can_fetch_more(&self, parent: Option<ModelIndex>) -> bool {
        self.parent_node(parent)
            .and_then(|id| self.arena.get(id))
            .is_some_and(|node| node.fetched_count() < node.child_count())
    }

    /// Reveal up to one page of further children of `parent`.
    pub fn fetch_more(&mut self, parent: Option<ModelIndex>) {
        let Some(id) = self.parent_node(parent) else {
            return;
        };
        let Some(node) = self.arena.get(id) else {
            return;
        };
        let fetched = node.fetched_count();
        let remaining = node.child_count().saturating_sub(fetched);
        let n = self.config.page_size.max(1).min(remaining);
        if n == 0 {
            return;
        }

        let (first, last) = (fetched, fetched + n - 1);
        self.events.push(ModelEvent::RowsAboutToBeInserted { parent, first, last });
        self.arena.set_fetched(id, fetched + n);
        self.events.push(ModelEvent::RowsInserted { parent, first, last });
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "jtree.fetch", first, last, remaining = remaining - n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCENARIO: &str = r#"{"version":1,"_headers_":"Name:name:0,Value:value:1","name":"root","value":"x","_children_":[{"name":"a","value":"1"}]}"#;

    fn loaded(json: Value) -> TreeDocument {
        let mut doc = TreeDocument::new();
        doc.load_value(json).unwrap();
        doc.take_events();
        doc
    }

    #[test]
    fn scenario_one_top_level_row_with_one_child() {
        let mut doc = TreeDocument::new();
        doc.load(SCENARIO.as_bytes()).unwrap();
        assert_eq!(doc.row_count(None), 1);
        let top = doc.index(0, 0, None).unwrap();
        assert_eq!(doc.row_count(Some(top)), 1);
        let child = doc.index(0, 1, Some(top)).unwrap();
        assert_eq!(doc.value(child), Some(&json!("1")));
        assert_eq!(doc.total_count(), 2);
    }

    #[test]
    fn two_part_header_fails_with_missing_or_invalid_headers() {
        let mut doc = TreeDocument::new();
        let err = doc
            .load(br#"{"version":1,"_headers_":"Name:name","name":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingOrInvalidHeaders { .. }));
        assert!(doc.is_empty());
        assert_eq!(doc.error(), Some(&err));
        assert_eq!(
            err.offending_map().and_then(|m| m.get(HEADERS)),
            Some(&json!("Name:name"))
        );
    }

    #[test]
    fn version_too_high_is_rejected() {
        let mut doc = TreeDocument::new();
        let err = doc
            .load(br#"{"version":99,"_headers_":"Name:name:0"}"#)
            .unwrap_err();
        assert_eq!(err, LoadError::UnsupportedVersion { found: 99, max: 3 });
    }

    #[test]
    fn missing_version_is_rejected() {
        let mut doc = TreeDocument::new();
        let err = doc.load(br#"{"_headers_":"Name:name:0"}"#).unwrap_err();
        assert_eq!(
            err,
            LoadError::MissingVersion {
                key: "version".to_string()
            }
        );
    }

    #[test]
    fn configured_version_key_is_honored() {
        let config = DocumentConfig::default().with_version_key("rev");
        let mut doc = TreeDocument::with_config(config);
        doc.load(br#"{"rev":"2","_headers_":"Name:name:0"}"#).unwrap();
        assert!(!doc.is_empty());
    }

    #[test]
    fn empty_and_garbage_input() {
        let mut doc = TreeDocument::new();
        assert_eq!(doc.load(b""), Err(LoadError::EmptyInput));
        assert_eq!(doc.load(b"  \n"), Err(LoadError::EmptyInput));
        assert_eq!(doc.load(b"{}"), Err(LoadError::EmptyInput));
        assert!(matches!(doc.load(b"{\"a\":"), Err(LoadError::Parse { .. })));
        assert!(matches!(doc.load(b"[1,2]"), Err(LoadError::InvalidMap { .. })));
    }

    #[test]
    fn failed_load_clears_previous_tree() {
        let mut doc = TreeDocument::new();
        doc.load(SCENARIO.as_bytes()).unwrap();
        assert!(doc.load(br#"{"version":1}"#).is_err());
        assert!(doc.is_empty());
        assert_eq!(doc.row_count(None), 0);
        assert_eq!(doc.column_count(), 0);
    }

    #[test]
    fn successful_load_clears_retained_error() {
        let mut doc = TreeDocument::new();
        assert!(doc.load(b"{").is_err());
        assert!(doc.error().is_some());
        doc.load(SCENARIO.as_bytes()).unwrap();
        assert!(doc.error().is_none());
    }

    #[test]
    fn blob_replaces_top_level_object() {
        let doc = loaded(json!({
            "version": 1,
            "_headers_": "Ignored:ignored:0",
            "_blob_": {"_headers_": "Name:name:0", "name": "inner"}
        }));
        let top = doc.index(0, 0, None).unwrap();
        assert_eq!(doc.value(top), Some(&json!("inner")));
        assert_eq!(doc.header_data(0), Some("Name"));
    }

    #[test]
    fn header_data_and_column_count() {
        let doc = loaded(json!({"version": 1, "_headers_": "Name:name:0,Value:value:1"}));
        assert_eq!(doc.column_count(), 2);
        assert_eq!(doc.header_data(1), Some("Value"));
        assert_eq!(doc.header_data(2), None);
    }

    #[test]
    fn draw_only_column_has_no_value() {
        let doc = loaded(json!({
            "version": 1,
            "_headers_": "Name:name:0,Go:go:1:draw",
            "name": "r",
            "go": "stored anyway",
            "_widget_:go": "QPushButton,Go"
        }));
        let cell = doc.index(0, 1, None).unwrap();
        assert_eq!(doc.value(cell), None);
        assert_eq!(doc.data(cell, Role::Display), None);
    }

    #[test]
    fn numeric_draw_only_tag_never_reads_another_column() {
        let doc = loaded(json!({
            "version": 1,
            "_headers_": "Btn:1:0:draw,Val:v:1",
            "1": "fabricated",
            "v": "kept"
        }));
        let button = doc.index(0, 0, None).unwrap();
        assert_eq!(doc.value(button), None);
        let value = doc.index(0, 1, None).unwrap();
        assert_eq!(doc.value(value), Some(&json!("kept")));
    }

    #[test]
    fn parent_of_top_level_is_none() {
        let doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 0, None).unwrap();
        let child = doc.index(0, 1, Some(top)).unwrap();
        assert_eq!(doc.parent(top), None);
        let parent = doc.parent(child).unwrap();
        assert_eq!(parent.node(), top.node());
        assert_eq!(parent.column(), 0);
    }

    #[test]
    fn non_zero_column_parent_has_no_rows() {
        let doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 1, None).unwrap();
        assert_eq!(doc.row_count(Some(top)), 0);
    }

    #[test]
    fn set_value_writes_tagged_field_and_notifies() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 1, None).unwrap();
        assert!(doc.set_value(top, json!("y")));
        assert_eq!(doc.value(top), Some(&json!("y")));
        assert_eq!(doc.take_events(), vec![ModelEvent::DataChanged { index: top }]);
    }

    #[test]
    fn set_value_with_map_replaces_node() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 0, None).unwrap();
        assert!(doc.set_value(
            top,
            json!({"name": "new", "_children_": [{"name": "p"}, {"name": "q"}]})
        ));
        assert_eq!(doc.value(top), Some(&json!("new")));
        assert_eq!(doc.row_count(Some(top)), 2);
        assert_eq!(doc.total_count(), 3);
        assert_eq!(doc.node(top.node()).unwrap().field("value"), None);
    }

    #[test]
    fn flags_follow_readonly_and_widget_markers() {
        let mut doc = loaded(json!({
            "version": 1,
            "_headers_": "Name:name:0,Check:check:1",
            "_readonly_:name": true,
            "_widget_:check": "QCheckBox"
        }));
        let name = doc.index(0, 0, None).unwrap();
        let check = doc.index(0, 1, None).unwrap();
        assert!(!doc.flags(name).contains(ItemFlags::ENABLED));
        assert!(doc.flags(check).contains(ItemFlags::USER_CHECKABLE | ItemFlags::EDITABLE));

        doc.set_special_flags(SpecialFlags::HONOR_HIDE);
        assert!(doc.flags(name).contains(ItemFlags::ENABLED));
        assert_eq!(
            doc.take_events(),
            vec![ModelEvent::LayoutAboutToBeChanged, ModelEvent::LayoutChanged]
        );
    }

    #[test]
    fn insert_requires_resolvable_parent_and_count() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        assert_eq!(
            doc.try_insert_rows(0, 1, None),
            Err(MutationError::UnresolvedParent)
        );
        let top = doc.index(0, 0, None).unwrap();
        assert_eq!(doc.try_insert_rows(0, 0, Some(top)), Err(MutationError::ZeroCount));
        assert!(doc.events().is_empty());
    }

    #[test]
    fn insert_appends_placeholders_with_bracketing_events() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 0, None).unwrap();
        assert!(doc.insert_rows(0, 2, Some(top)));
        assert_eq!(doc.row_count(Some(top)), 3);
        assert_eq!(doc.total_count(), 4);
        assert_eq!(
            doc.take_events(),
            vec![
                ModelEvent::RowsAboutToBeInserted { parent: Some(top), first: 1, last: 2 },
                ModelEvent::RowsInserted { parent: Some(top), first: 1, last: 2 },
            ]
        );
        let placeholder = doc.index(2, 0, Some(top)).unwrap();
        assert!(doc.node(placeholder.node()).unwrap().fields().is_empty());
    }

    #[test]
    fn remove_keeps_total_exact_for_subtrees() {
        let mut doc = loaded(json!({
            "version": 1,
            "_headers_": "Name:name:0",
            "_children_": [
                {"name": "a", "_children_": [{"name": "a1"}, {"name": "a2"}]},
                {"name": "b"}
            ]
        }));
        assert_eq!(doc.total_count(), 5);
        let top = doc.index(0, 0, None).unwrap();
        assert!(doc.remove_rows(0, 1, Some(top)));
        assert_eq!(doc.total_count(), 2);
        let remaining = doc.index(0, 0, Some(top)).unwrap();
        assert_eq!(doc.value(remaining), Some(&json!("b")));
    }

    #[test]
    fn remove_out_of_range_is_refused() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 0, None).unwrap();
        assert_eq!(
            doc.try_remove_rows(0, 2, Some(top)),
            Err(MutationError::RowOutOfRange { row: 0, count: 2, len: 1 })
        );
        assert!(!doc.remove_rows(0, 0, Some(top)));
    }

    #[test]
    fn insert_count_overflow_is_refused() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let top = doc.index(0, 0, None).unwrap();
        assert_eq!(
            doc.try_insert_rows(0, usize::MAX, Some(top)),
            Err(MutationError::RowOutOfRange { row: 0, count: usize::MAX, len: 1 })
        );
        assert_eq!(doc.row_count(Some(top)), 1);
        assert!(doc.events().is_empty());
    }

    #[test]
    fn remove_brackets_range_with_events() {
        let mut doc = loaded(json!({
            "version": 1,
            "_headers_": "Name:name:0",
            "_children_": [{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}]
        }));
        let top = doc.index(0, 0, None).unwrap();
        assert!(doc.remove_rows(1, 2, Some(top)));
        assert_eq!(
            doc.take_events(),
            vec![
                ModelEvent::RowsAboutToBeRemoved { parent: Some(top), first: 1, last: 2 },
                ModelEvent::RowsRemoved { parent: Some(top), first: 1, last: 2 },
            ]
        );
        let names: Vec<String> = (0..doc.row_count(Some(top)))
            .filter_map(|row| doc.index(row, 0, Some(top)))
            .map(|index| doc.text(index))
            .collect();
        assert_eq!(names, vec!["a", "d"]);
        assert_eq!(doc.total_count(), 3);
    }

    #[test]
    fn fetch_more_pages_through_children() {
        let children: Vec<Value> = (0..5).map(|i| json!({"name": i.to_string()})).collect();
        let mut doc = TreeDocument::with_config(DocumentConfig::default().with_page_size(2));
        doc.load_value(json!({"version": 1, "_headers_": "Name:name:0", "_children_": children}))
            .unwrap();
        doc.take_events();
        let top = doc.index(0, 0, None).unwrap();

        let mut pages = Vec::new();
        while doc.can_fetch_more(Some(top)) {
            doc.fetch_more(Some(top));
            pages.push(doc.node(top.node()).unwrap().fetched_count());
        }
        assert_eq!(pages, vec![2, 4, 5]);
        assert_eq!(
            doc.take_events().last(),
            Some(&ModelEvent::RowsInserted { parent: Some(top), first: 4, last: 4 })
        );
        doc.fetch_more(Some(top));
        assert!(doc.events().is_empty());
    }

    #[test]
    fn save_without_options_round_trips() {
        let doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let saved = doc
            .save(&SaveOptions::new().with_field("version", json!(1)))
            .unwrap();
        let original: Value = serde_json::from_str(SCENARIO).unwrap();
        assert_eq!(Value::Object(saved), original);
    }

    #[test]
    fn save_uses_document_purge_spec_by_default() {
        let mut doc = loaded(json!({
            "version": 1,
            "_headers_": "Name:name:0",
            "_children_": [{"name": "a", "secret": 1}, {"name": "b"}]
        }));
        doc.set_purge_spec(PurgeSpec::new().drop_nodes_with("secret"));
        let saved = doc.save(&SaveOptions::new()).unwrap();
        assert_eq!(saved["_children_"], json!([{"name": "b"}]));
        // Explicit options win.
        let saved = doc.save(&SaveOptions::new().with_purge(PurgeSpec::new())).unwrap();
        assert_eq!(saved["_children_"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn save_empty_document_fails() {
        let doc = TreeDocument::new();
        assert!(matches!(doc.save(&SaveOptions::new()), Err(SaveError::EmptyDocument)));
    }

    /// Accepts at most `chunk` bytes per call and `capacity` bytes overall.
    struct ChunkedWriter {
        chunk: usize,
        capacity: usize,
        buf: Vec<u8>,
    }

    impl Write for ChunkedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let room = self.capacity - self.buf.len();
            let n = buf.len().min(self.chunk).min(room);
            self.buf.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn partial_writes_are_retried_until_done() {
        let doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let expected = doc.save_bytes(&SaveOptions::new(), IndentMode::Compact).unwrap();
        let mut writer = ChunkedWriter {
            chunk: 7,
            capacity: usize::MAX,
            buf: Vec::new(),
        };
        let written = doc
            .save_to(&mut writer, &SaveOptions::new(), IndentMode::Compact)
            .unwrap();
        assert_eq!(written, expected.len());
        assert_eq!(writer.buf, expected);
    }

    #[test]
    fn short_write_reports_requested_and_written() {
        let doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        let expected = doc.save_bytes(&SaveOptions::new(), IndentMode::Compact).unwrap().len();
        let writer = ChunkedWriter {
            chunk: 7,
            capacity: 10,
            buf: Vec::new(),
        };
        match doc.save_to(writer, &SaveOptions::new(), IndentMode::Compact) {
            Err(SaveError::ShortWrite { requested, written }) => {
                assert_eq!(requested, expected);
                assert_eq!(written, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(doc.total_count(), 2);
    }

    #[test]
    fn clear_resets_policy_and_emits_reset() {
        let mut doc = loaded(serde_json::from_str(SCENARIO).unwrap());
        doc.set_special_flags(SpecialFlags::empty());
        doc.take_events();
        doc.clear();
        assert!(doc.is_empty());
        assert_eq!(doc.special_flags(), SpecialFlags::default());
        assert_eq!(
            doc.take_events(),
            vec![ModelEvent::ModelAboutToBeReset, ModelEvent::ModelReset]
        );
    }
}

//! Tree nodes stored in a generational arena.
//!
//! Each [`TreeNode`] is one JSON object: its own fields plus an ordered list of
//! children. Parent and root links are [`NodeId`] handles into the owning
//! [`NodeArena`], so there are no ownership cycles; removing a node frees its
//! whole subtree.
//!
//! The arena owns the single [`HeaderSchema`] derived when a root node is
//! built, and each root keeps the aggregate count of nodes reachable below it.
//!
//! ```
//! use jtree_model::node::NodeArena;
//! use serde_json::json;
//!
//! let map = json!({
//!     "_headers_": "Name:name:0",
//!     "name": "root",
//!     "_children_": [{"name": "a"}, {"name": "b"}]
//! });
//! let mut arena = NodeArena::new();
//! let root = arena.create(None, map.as_object().cloned().unwrap(), false);
//! assert_eq!(arena.get(root).unwrap().child_count(), 2);
//! assert_eq!(arena.total_count(root), 2);
//! assert!(!arena.get(root).unwrap().fields().contains_key("_children_"));
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::markers::{self, CHILDREN, HAS_RO_SET, HEADERS, READONLY};
use crate::presentation::Overrides;
use crate::purge::PurgeSpec;
use crate::schema::HeaderSchema;

/// Stable handle to a node. Handles to freed nodes never resolve again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Outcome of building a node from a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    #[default]
    Ok,
    /// Reserved for stricter structural validation.
    InvalidMap,
    MissingOrInvalidHeaders,
}

impl Validity {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// One JSON object of the tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    fields: Map<String, Value>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    root: NodeId,
    /// Children revealed to a consumer so far.
    fetched: usize,
    /// Nodes reachable below this node; maintained on roots only.
    total_count: usize,
    /// Cached "any key contains `_readonly_`".
    has_ro_set: bool,
    overrides: Overrides,
    validity: Validity,
    invalid_map: Option<Map<String, Value>>,
}

impl TreeNode {
    fn placeholder(id: NodeId, parent: Option<NodeId>, root: Option<NodeId>) -> Self {
        Self {
            fields: Map::new(),
            children: Vec::new(),
            parent,
            root: root.unwrap_or(id),
            fetched: 0,
            total_count: 0,
            has_ro_set: false,
            overrides: Overrides::default(),
            validity: Validity::Ok,
            invalid_map: None,
        }
    }

    /// The node's own fields; never contains `_children_` or the read-only cache.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Write one field. Structural keys are refused: use
    /// [`NodeArena::from_map`] to replace children.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if key == CHILDREN || key == HAS_RO_SET {
            return false;
        }
        if key.contains(READONLY) {
            self.has_ro_set = true;
        }
        self.fields.insert(key, value);
        true
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, row: usize) -> Option<NodeId> {
        self.children.get(row).copied()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn fetched_count(&self) -> usize {
        self.fetched
    }

    /// Whether any field key contains `_readonly_`.
    #[must_use]
    pub fn has_read_only_marker(&self) -> bool {
        self.has_ro_set
    }

    #[must_use]
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut Overrides {
        &mut self.overrides
    }

    #[must_use]
    pub fn validity(&self) -> Validity {
        self.validity
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validity.is_ok()
    }

    /// The map that made construction fail, if it did.
    #[must_use]
    pub fn invalid_map(&self) -> Option<&Map<String, Value>> {
        self.invalid_map.as_ref()
    }

    /// Display text of the field bound to `tag`.
    #[must_use]
    pub fn text(&self, tag: &str) -> String {
        markers::display_text(self.fields.get(tag))
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<TreeNode>,
}

/// Owner of every node of a document.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    schema: Option<Arc<HeaderSchema>>,
}

impl NodeArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema derived from the root's `_headers_`, shared by every node.
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<HeaderSchema>> {
        self.schema.as_ref()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, parent: Option<NodeId>) -> NodeId {
        let root = parent.and_then(|p| self.get(p)).map(TreeNode::root);
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                node: None,
            });
            NodeId {
                index,
                generation: 0,
            }
        };
        self.slots[id.index as usize].node = Some(TreeNode::placeholder(id, parent, root));
        self.live += 1;
        id
    }

    /// Build a node under `parent` (or a new root when `None`).
    ///
    /// The node is not attached: callers append it with
    /// [`append_child`](Self::append_child). An empty map yields an empty
    /// placeholder. A root whose `_headers_` do not parse is marked
    /// [`Validity::MissingOrInvalidHeaders`] unless `ignore_header_check`.
    pub fn create(
        &mut self,
        parent: Option<NodeId>,
        map: Map<String, Value>,
        ignore_header_check: bool,
    ) -> NodeId {
        let id = self.alloc(parent);
        if !map.is_empty() {
            self.from_map(id, map, ignore_header_check);
        }
        id
    }

    /// Replace the node's content with `map`, rebuilding its children.
    ///
    /// Previous children are freed and the root's aggregate count adjusted.
    pub fn from_map(
        &mut self,
        id: NodeId,
        mut map: Map<String, Value>,
        ignore_header_check: bool,
    ) -> Validity {
        let Some(node) = self.get(id) else {
            return Validity::InvalidMap;
        };
        let parent = node.parent;
        let old_children = node.children.clone();

        for child in old_children {
            let freed = self.free_subtree(child);
            self.adjust_total(id, -(freed as isize));
        }

        let root = match parent.and_then(|p| self.get(p)) {
            Some(parent_node) => parent_node.root,
            None => {
                let schema = map
                    .get(HEADERS)
                    .and_then(Value::as_str)
                    .and_then(|descriptor| HeaderSchema::parse(descriptor).ok());
                match schema {
                    Some(schema) => self.schema = Some(Arc::new(schema)),
                    None if ignore_header_check => {}
                    None => {
                        if let Some(node) = self.get_mut(id) {
                            node.root = id;
                            node.children.clear();
                            node.validity = Validity::MissingOrInvalidHeaders;
                            node.invalid_map = Some(map);
                        }
                        return Validity::MissingOrInvalidHeaders;
                    }
                }
                id
            }
        };

        let has_ro_set = map.keys().any(|k| k.contains(READONLY));
        let children = match map.remove(CHILDREN) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        map.remove(HAS_RO_SET);

        if let Some(node) = self.get_mut(id) {
            node.root = root;
            node.fields = map;
            node.children.clear();
            node.fetched = 0;
            node.has_ro_set = has_ro_set;
            node.validity = Validity::Ok;
            node.invalid_map = None;
        }

        for item in children {
            let child_map = match item {
                Value::Object(obj) => obj,
                _ => Map::new(),
            };
            let child = self.create(Some(id), child_map, false);
            self.append_child(id, child);
        }

        Validity::Ok
    }

    /// Attach `child` as the last child of `parent`; bumps the root count by one.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(node) = self.get_mut(parent) else {
            return false;
        };
        node.children.push(child);
        let root = node.root;
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        self.adjust_total(root, 1);
        true
    }

    /// Detach and free the child at `row`, decrementing the root count by one.
    ///
    /// Returns the number of nodes freed (the child plus its descendants) so a
    /// caller that needs an exact aggregate can account for the remainder.
    pub fn remove_child(&mut self, parent: NodeId, row: usize) -> Option<usize> {
        let node = self.get_mut(parent)?;
        if row >= node.children.len() {
            return None;
        }
        let child = node.children.remove(row);
        if node.fetched > node.children.len() {
            node.fetched = node.children.len();
        }
        let root = node.root;
        let freed = self.free_subtree(child);
        self.adjust_total(root, -1);
        Some(freed)
    }

    /// Drop every child of `id` and free their subtrees.
    pub fn clear_children(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let children = node.children.clone();
        for child in children {
            let freed = self.free_subtree(child);
            self.adjust_total(id, -(freed as isize));
        }
        if let Some(node) = self.get_mut(id) {
            node.children.clear();
            node.fetched = 0;
        }
    }

    fn free_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                self.live -= 1;
                freed += 1;
            }
        }
        freed
    }

    pub(crate) fn adjust_total(&mut self, id: NodeId, delta: isize) {
        let Some(root) = self.get(id).map(TreeNode::root) else {
            return;
        };
        if let Some(root) = self.get_mut(root) {
            root.total_count = root.total_count.saturating_add_signed(delta);
        }
    }

    pub(crate) fn set_fetched(&mut self, id: NodeId, fetched: usize) {
        if let Some(node) = self.get_mut(id) {
            node.fetched = fetched.min(node.children.len());
        }
    }

    /// Aggregate count of nodes below the root of `id`'s tree.
    #[must_use]
    pub fn total_count(&self, id: NodeId) -> usize {
        self.get(id)
            .and_then(|node| self.get(node.root))
            .map_or(0, |root| root.total_count)
    }

    /// Position of `id` among its parent's children; 0 without a parent.
    #[must_use]
    pub fn row(&self, id: NodeId) -> usize {
        self.get(id)
            .and_then(|node| node.parent)
            .and_then(|parent| self.get(parent))
            .and_then(|parent| parent.children.iter().position(|&c| c == id))
            .unwrap_or(0)
    }

    /// Ordering hint: `row()` plus the child counts of every ancestor's parent.
    ///
    /// Not a pre-order index for non-trivial trees.
    #[must_use]
    pub fn row_absolute(&self, id: NodeId) -> usize {
        let Some(node) = self.get(id) else {
            return 0;
        };
        let Some(parent) = node.parent else {
            return 0;
        };
        let mut n = self.row(id);
        let mut ancestor = self.get(parent).and_then(|p| p.parent);
        while let Some(current) = ancestor.and_then(|a| self.get(a)) {
            n += current.child_count();
            ancestor = current.parent;
        }
        n
    }

    /// Size hint derived from [`row_absolute`](Self::row_absolute).
    #[must_use]
    pub fn total_child_count(&self, id: NodeId) -> usize {
        self.total_count(id).saturating_sub(self.row_absolute(id))
    }

    /// Exact number of descendants of `id`.
    #[must_use]
    pub fn subtree_size(&self, id: NodeId) -> usize {
        let Some(node) = self.get(id) else {
            return 0;
        };
        let mut stack: Vec<NodeId> = node.children.clone();
        let mut count = 0;
        while let Some(current) = stack.pop() {
            if let Some(n) = self.get(current) {
                count += 1;
                stack.extend_from_slice(&n.children);
            }
        }
        count
    }

    /// Rebuild the JSON object for `id` and its subtree.
    ///
    /// Returns `None` when a purge rule drops the node. A node that had
    /// children always carries `_children_`, even when every child was dropped.
    #[must_use]
    pub fn to_map(
        &self,
        id: NodeId,
        purge: &PurgeSpec,
        strip_descriptive: bool,
    ) -> Option<Map<String, Value>> {
        let node = self.get(id)?;
        let mut map = node.fields.clone();
        map.remove(HAS_RO_SET);

        if !purge.is_empty() {
            let mut drop_node = false;
            map.retain(|key, _| match purge.rule(key) {
                Some(true) => {
                    drop_node = true;
                    true
                }
                Some(false) => false,
                None => true,
            });
            if drop_node {
                return None;
            }
        }

        if strip_descriptive {
            map.retain(|key, _| !markers::is_descriptive(key));
        }

        if node.has_children() {
            let children: Vec<Value> = node
                .children
                .iter()
                .filter_map(|&child| self.to_map(child, purge, strip_descriptive))
                .map(Value::Object)
                .collect();
            map.insert(CHILDREN.to_string(), Value::Array(children));
        }

        Some(map)
    }
}

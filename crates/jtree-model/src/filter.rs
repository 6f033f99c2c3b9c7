//! Filtered projection over a [`TreeDocument`] and the search entry point.
//!
//! [`FilterView`] answers pure questions (is this row visible, which columns
//! match) and never touches selection state. [`search`] is the one place that
//! turns matches into a [`Selection`].

use std::collections::BTreeSet;

use crate::document::{ModelIndex, TreeDocument};
use crate::node::NodeId;

/// What a search looks for in a cell's display text.
#[derive(Debug, Clone)]
pub enum SearchPattern {
    /// Case-insensitive substring; stored lowercased.
    Fixed(String),
    #[cfg(feature = "regex-search")]
    Regex(regex::Regex),
}

impl SearchPattern {
    #[must_use]
    pub fn fixed(text: &str) -> Self {
        Self::Fixed(text.to_lowercase())
    }

    /// Case-insensitive regular expression.
    #[cfg(feature = "regex-search")]
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Self::Regex)
    }

    /// An empty fixed pattern matches every cell.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Fixed(needle) => text.to_lowercase().contains(needle.as_str()),
            #[cfg(feature = "regex-search")]
            Self::Regex(re) => re.is_match(text),
        }
    }
}

/// Row visibility and match queries combining document policy with a pattern.
#[derive(Debug, Clone, Default)]
pub struct FilterView {
    pattern: Option<SearchPattern>,
    filter_rows: bool,
}

impl FilterView {
    /// A view that applies only the document's row rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: SearchPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Also hide rows where neither the row nor any descendant matches.
    #[must_use]
    pub fn filter_rows(mut self, enabled: bool) -> Self {
        self.filter_rows = enabled;
        self
    }

    #[must_use]
    pub fn pattern(&self) -> Option<&SearchPattern> {
        self.pattern.as_ref()
    }

    /// Whether the row of `node` is visible through this view.
    #[must_use]
    pub fn accepts(&self, doc: &TreeDocument, node: NodeId) -> bool {
        let Some(tree_node) = doc.node(node) else {
            return false;
        };
        if doc.is_row_suppressed(tree_node) {
            return false;
        }
        match (&self.pattern, self.filter_rows) {
            (Some(pattern), true) => self.subtree_matches(doc, node, pattern),
            _ => true,
        }
    }

    fn subtree_matches(&self, doc: &TreeDocument, node: NodeId, pattern: &SearchPattern) -> bool {
        if !matching_columns(doc, node, pattern).is_empty() {
            return true;
        }
        doc.node(node).is_some_and(|n| {
            n.children().iter().any(|&child| {
                doc.node(child)
                    .is_some_and(|c| !doc.is_row_suppressed(c))
                    && self.subtree_matches(doc, child, pattern)
            })
        })
    }

    /// Columns of `node` whose display text matches the pattern. Empty
    /// without a pattern.
    #[must_use]
    pub fn matches(&self, doc: &TreeDocument, node: NodeId) -> BTreeSet<usize> {
        match &self.pattern {
            Some(pattern) => matching_columns(doc, node, pattern),
            None => BTreeSet::new(),
        }
    }

    /// Source rows under `parent` that this view shows, in order.
    #[must_use]
    pub fn visible_rows(&self, doc: &TreeDocument, parent: Option<ModelIndex>) -> Vec<usize> {
        let parent_node = match parent {
            Some(index) => doc.node(index.node()),
            None => doc.root().and_then(|root| doc.node(root)),
        };
        let Some(parent_node) = parent_node else {
            return Vec::new();
        };
        parent_node
            .children()
            .iter()
            .enumerate()
            .filter(|&(_, &child)| self.accepts(doc, child))
            .map(|(row, _)| row)
            .collect()
    }

    #[must_use]
    pub fn row_count(&self, doc: &TreeDocument, parent: Option<ModelIndex>) -> usize {
        self.visible_rows(doc, parent).len()
    }

    /// Source row shown at `proxy_row`.
    #[must_use]
    pub fn map_to_source(
        &self,
        doc: &TreeDocument,
        proxy_row: usize,
        parent: Option<ModelIndex>,
    ) -> Option<usize> {
        self.visible_rows(doc, parent).get(proxy_row).copied()
    }

    /// Position of `source_row` in the view, `None` when filtered out.
    #[must_use]
    pub fn map_from_source(
        &self,
        doc: &TreeDocument,
        source_row: usize,
        parent: Option<ModelIndex>,
    ) -> Option<usize> {
        self.visible_rows(doc, parent)
            .iter()
            .position(|&row| row == source_row)
    }
}

fn matching_columns(doc: &TreeDocument, node: NodeId, pattern: &SearchPattern) -> BTreeSet<usize> {
    let (Some(tree_node), Some(schema)) = (doc.node(node), doc.schema()) else {
        return BTreeSet::new();
    };
    schema
        .columns()
        .iter()
        .filter(|column| !column.draw_only && !doc.is_cell_suppressed(tree_node, &column.tag))
        .filter(|column| pattern.is_match(&tree_node.text(&column.tag)))
        .map(|column| column.index)
        .collect()
}

/// One matching cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub node: NodeId,
    pub column: usize,
}

/// Ordered set of selected cells with a cycling cursor.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    hits: Vec<SearchHit>,
    cursor: Option<usize>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.cursor = None;
    }

    /// Replace the selection with `hits`; the cursor restarts.
    pub fn select_all(&mut self, hits: impl IntoIterator<Item = SearchHit>) {
        self.hits = hits.into_iter().collect();
        self.cursor = None;
    }

    #[must_use]
    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[must_use]
    pub fn current(&self) -> Option<SearchHit> {
        self.cursor.and_then(|i| self.hits.get(i).copied())
    }

    /// Advance to the next hit, wrapping after the last.
    pub fn next_hit(&mut self) -> Option<SearchHit> {
        if self.hits.is_empty() {
            return None;
        }
        let next = self.cursor.map_or(0, |i| (i + 1) % self.hits.len());
        self.cursor = Some(next);
        self.hits.get(next).copied()
    }
}

/// Every matching cell of visible rows, in pre-order.
#[must_use]
pub fn find_matches(doc: &TreeDocument, pattern: &SearchPattern) -> Vec<SearchHit> {
    let view = FilterView::new();
    let mut hits = Vec::new();
    let Some(top) = doc.top_level() else {
        return hits;
    };
    let mut stack = vec![top];
    while let Some(id) = stack.pop() {
        if !view.accepts(doc, id) {
            continue;
        }
        hits.extend(
            matching_columns(doc, id, pattern)
                .into_iter()
                .map(|column| SearchHit { node: id, column }),
        );
        if let Some(node) = doc.node(id) {
            stack.extend(node.children().iter().rev());
        }
    }
    hits
}

/// Clear `selection`, collect matches across the tree, then select them all.
/// Returns the number of hits.
pub fn search(doc: &TreeDocument, pattern: &SearchPattern, selection: &mut Selection) -> usize {
    selection.clear();
    let hits = find_matches(doc, pattern);
    #[cfg(feature = "tracing")]
    tracing::debug!(message = "jtree.search", hits = hits.len());
    selection.select_all(hits);
    selection.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SpecialFlags;
    use serde_json::json;

    fn doc() -> TreeDocument {
        let mut doc = TreeDocument::new();
        doc.load_value(json!({
            "version": 1,
            "_headers_": "Name:name:0,Value:value:1",
            "name": "root",
            "value": "",
            "_children_": [
                {"name": "Alpha", "value": "one"},
                {"name": "beta", "value": "two", "_hide_": true},
                {"name": "gamma", "value": "ALPHA", "_children_": [{"name": "deep alpha"}]},
                {"name": "delta", "_readonly_:name": true},
                {"name": "template alpha", "_template_": 1}
            ]
        }))
        .unwrap();
        doc
    }

    #[test]
    fn fixed_pattern_is_case_insensitive() {
        let pattern = SearchPattern::fixed("AlPhA");
        assert!(pattern.is_match("alpha"));
        assert!(pattern.is_match("xx ALPHA yy"));
        assert!(!pattern.is_match("beta"));
        assert!(SearchPattern::fixed("").is_match("anything"));
    }

    #[test]
    fn accepts_applies_row_rules_only() {
        let doc = doc();
        let view = FilterView::new();
        assert_eq!(view.visible_rows(&doc, doc.index(0, 0, None)), vec![0, 2, 3]);
    }

    #[test]
    fn read_only_hides_row_when_policy_says_so() {
        let mut doc = doc();
        doc.set_special_flags(SpecialFlags::default() | SpecialFlags::READ_ONLY_HIDES_ROW);
        let view = FilterView::new();
        assert_eq!(view.visible_rows(&doc, doc.index(0, 0, None)), vec![0, 2]);
    }

    #[test]
    fn matches_reports_columns_without_touching_selection() {
        let doc = doc();
        let top = doc.index(0, 0, None).unwrap();
        let gamma = doc.index(2, 0, Some(top)).unwrap();
        let view = FilterView::new().with_pattern(SearchPattern::fixed("alpha"));
        assert_eq!(view.matches(&doc, gamma.node()), BTreeSet::from([1]));
        assert!(FilterView::new().matches(&doc, gamma.node()).is_empty());
    }

    #[test]
    fn row_filtering_keeps_ancestors_of_matches() {
        let doc = doc();
        let top = doc.index(0, 0, None);
        let view = FilterView::new()
            .with_pattern(SearchPattern::fixed("deep"))
            .filter_rows(true);
        assert_eq!(view.visible_rows(&doc, top), vec![2]);
        assert_eq!(view.map_to_source(&doc, 0, top), Some(2));
        assert_eq!(view.map_from_source(&doc, 2, top), Some(0));
        assert_eq!(view.map_from_source(&doc, 0, top), None);
        assert_eq!(view.visible_rows(&doc, None), vec![0]);
    }

    #[test]
    fn search_selects_every_visible_match_in_order() {
        let doc = doc();
        let mut selection = Selection::new();
        let n = search(&doc, &SearchPattern::fixed("alpha"), &mut selection);
        assert_eq!(n, 3);
        let names: Vec<String> = selection
            .hits()
            .iter()
            .map(|hit| doc.node(hit.node).unwrap().text("name"))
            .collect();
        assert_eq!(names, vec!["Alpha", "gamma", "deep alpha"]);
    }

    #[test]
    fn next_hit_cycles() {
        let doc = doc();
        let mut selection = Selection::new();
        search(&doc, &SearchPattern::fixed("alpha"), &mut selection);
        let first = selection.next_hit();
        selection.next_hit();
        selection.next_hit();
        assert_eq!(selection.next_hit(), first);
        assert_eq!(selection.current(), first);
    }

    #[test]
    fn search_replaces_previous_selection() {
        let doc = doc();
        let mut selection = Selection::new();
        search(&doc, &SearchPattern::fixed("alpha"), &mut selection);
        assert_eq!(search(&doc, &SearchPattern::fixed("nothing"), &mut selection), 0);
        assert!(selection.is_empty());
        assert_eq!(selection.next_hit(), None);
    }

    #[cfg(feature = "regex-search")]
    #[test]
    fn regex_pattern_matches_case_insensitively() {
        let doc = doc();
        let mut selection = Selection::new();
        let pattern = SearchPattern::regex("^(alpha|delta)$").unwrap();
        assert_eq!(search(&doc, &pattern, &mut selection), 3);
        assert!(SearchPattern::regex("(").is_err());
    }
}

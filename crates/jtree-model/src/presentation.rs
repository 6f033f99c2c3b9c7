//! Color and font overrides and their precedence cascade.
//!
//! Tokens are opaque to the model: it stores and returns them, the embedding
//! view decides what they mean.
//!
//! For a cell the cascade is, first enabled tier with a value wins:
//!
//! 1. the node's own override (`HONOR_ITEM_*`),
//! 2. the document's parents override for nodes with children
//!    (`HONOR_PARENTS_*`), or its childs override for leaves (`HONOR_CHILDS_*`),
//! 3. the document's per-column override for the column tag (`HONOR_COLUMN_*`).
//!
//! Foreground additionally yields nothing while the node carries a
//! `_readonly_:<tag>` marker, so the view falls back to its disabled look.

use ahash::AHashMap;

use crate::markers::{self, READONLY};
use crate::node::TreeNode;
use crate::policy::SpecialFlags;

/// Opaque color value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorToken(String);

impl ColorToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque font value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontToken(String);

impl FontToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What a view asks a cell for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Display,
    Edit,
    ToolTip,
    Foreground,
    Background,
    Font,
}

impl Role {
    /// Roles answered from the node's stored field value.
    #[must_use]
    pub const fn is_value(self) -> bool {
        matches!(self, Self::Display | Self::Edit | Self::ToolTip)
    }
}

/// Independently settable color/font overrides for one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub foreground: Option<ColorToken>,
    pub background: Option<ColorToken>,
    pub font: Option<FontToken>,
}

impl Overrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foreground.is_none() && self.background.is_none() && self.font.is_none()
    }
}

/// Document-wide overrides: parent tier, child tier and per-column.
#[derive(Debug, Clone, Default)]
pub struct Presentation {
    pub parents: Overrides,
    pub childs: Overrides,
    column_foreground: AHashMap<String, ColorToken>,
    column_background: AHashMap<String, ColorToken>,
    column_font: AHashMap<String, FontToken>,
}

impl Presentation {
    pub fn set_column_foreground(&mut self, tag: impl Into<String>, color: ColorToken) {
        self.column_foreground.insert(tag.into(), color);
    }

    pub fn set_column_background(&mut self, tag: impl Into<String>, color: ColorToken) {
        self.column_background.insert(tag.into(), color);
    }

    pub fn set_column_font(&mut self, tag: impl Into<String>, font: FontToken) {
        self.column_font.insert(tag.into(), font);
    }

    #[must_use]
    pub fn column_foreground(&self, tag: &str) -> Option<&ColorToken> {
        self.column_foreground.get(tag)
    }

    #[must_use]
    pub fn column_background(&self, tag: &str) -> Option<&ColorToken> {
        self.column_background.get(tag)
    }

    #[must_use]
    pub fn column_font(&self, tag: &str) -> Option<&FontToken> {
        self.column_font.get(tag)
    }

    fn tier<'a>(&'a self, node: &TreeNode) -> &'a Overrides {
        if node.has_children() {
            &self.parents
        } else {
            &self.childs
        }
    }

    pub fn resolve_foreground<'a>(
        &'a self,
        node: &'a TreeNode,
        tag: &str,
        flags: SpecialFlags,
    ) -> Option<&'a ColorToken> {
        if node
            .fields()
            .contains_key(&markers::column_marker(READONLY, tag))
        {
            return None;
        }
        let tier_flag = if node.has_children() {
            SpecialFlags::HONOR_PARENTS_FOREGROUND_COLOR
        } else {
            SpecialFlags::HONOR_CHILDS_FOREGROUND_COLOR
        };
        cascade([
            (
                flags.contains(SpecialFlags::HONOR_ITEM_FOREGROUND_COLOR),
                node.overrides().foreground.as_ref(),
            ),
            (flags.contains(tier_flag), self.tier(node).foreground.as_ref()),
            (
                flags.contains(SpecialFlags::HONOR_COLUMN_FOREGROUND_COLOR),
                self.column_foreground(tag),
            ),
        ])
    }

    pub fn resolve_background<'a>(
        &'a self,
        node: &'a TreeNode,
        tag: &str,
        flags: SpecialFlags,
    ) -> Option<&'a ColorToken> {
        let tier_flag = if node.has_children() {
            SpecialFlags::HONOR_PARENTS_BACKGROUND_COLOR
        } else {
            SpecialFlags::HONOR_CHILDS_BACKGROUND_COLOR
        };
        cascade([
            (
                flags.contains(SpecialFlags::HONOR_ITEM_BACKGROUND_COLOR),
                node.overrides().background.as_ref(),
            ),
            (flags.contains(tier_flag), self.tier(node).background.as_ref()),
            (
                flags.contains(SpecialFlags::HONOR_COLUMN_BACKGROUND_COLOR),
                self.column_background(tag),
            ),
        ])
    }

    pub fn resolve_font<'a>(
        &'a self,
        node: &'a TreeNode,
        tag: &str,
        flags: SpecialFlags,
    ) -> Option<&'a FontToken> {
        let tier_flag = if node.has_children() {
            SpecialFlags::HONOR_PARENTS_FONT
        } else {
            SpecialFlags::HONOR_CHILDS_FONT
        };
        cascade([
            (
                flags.contains(SpecialFlags::HONOR_ITEM_FONT),
                node.overrides().font.as_ref(),
            ),
            (flags.contains(tier_flag), self.tier(node).font.as_ref()),
            (
                flags.contains(SpecialFlags::HONOR_COLUMN_FONT),
                self.column_font(tag),
            ),
        ])
    }
}

fn cascade<T>(tiers: [(bool, Option<&T>); 3]) -> Option<&T> {
    tiers
        .into_iter()
        .find_map(|(enabled, value)| if enabled { value } else { None })
}

//! Document policy flags and per-cell item flags.

use bitflags::bitflags;

use crate::error::ConfigError;

bitflags! {
    /// Which display/edit markers and presentation tiers the document honors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpecialFlags: u32 {
        /// `_readonly_:<tag>` disables the cell.
        const HONOR_READ_ONLY                 = 1;
        /// `_hide_` and `_hide_:<tag>` suppress rows/cells.
        const HONOR_HIDE                      = 1 << 1;
        /// Any `_readonly_` key hides the whole row (needs `HONOR_HIDE`).
        const READ_ONLY_HIDES_ROW             = 1 << 2;
        const HONOR_ITEM_FOREGROUND_COLOR     = 1 << 3;
        const HONOR_ITEM_BACKGROUND_COLOR     = 1 << 4;
        const HONOR_ITEM_FONT                 = 1 << 5;
        const HONOR_PARENTS_FOREGROUND_COLOR  = 1 << 6;
        const HONOR_PARENTS_BACKGROUND_COLOR  = 1 << 7;
        const HONOR_PARENTS_FONT              = 1 << 8;
        const HONOR_CHILDS_FOREGROUND_COLOR   = 1 << 9;
        const HONOR_CHILDS_BACKGROUND_COLOR   = 1 << 10;
        const HONOR_CHILDS_FONT               = 1 << 11;
        const HONOR_COLUMN_FOREGROUND_COLOR   = 1 << 12;
        const HONOR_COLUMN_BACKGROUND_COLOR   = 1 << 13;
        const HONOR_COLUMN_FONT               = 1 << 14;
    }
}

impl Default for SpecialFlags {
    fn default() -> Self {
        Self::HONOR_READ_ONLY | Self::HONOR_HIDE
    }
}

impl SpecialFlags {
    /// Every flag that gates a presentation tier.
    pub const HONOR_ALL_PRESENTATION: Self = Self::HONOR_ITEM_FOREGROUND_COLOR
        .union(Self::HONOR_ITEM_BACKGROUND_COLOR)
        .union(Self::HONOR_ITEM_FONT)
        .union(Self::HONOR_PARENTS_FOREGROUND_COLOR)
        .union(Self::HONOR_PARENTS_BACKGROUND_COLOR)
        .union(Self::HONOR_PARENTS_FONT)
        .union(Self::HONOR_CHILDS_FOREGROUND_COLOR)
        .union(Self::HONOR_CHILDS_BACKGROUND_COLOR)
        .union(Self::HONOR_CHILDS_FONT)
        .union(Self::HONOR_COLUMN_FOREGROUND_COLOR)
        .union(Self::HONOR_COLUMN_BACKGROUND_COLOR)
        .union(Self::HONOR_COLUMN_FONT);

    /// Whether a row carrying a read-only marker is hidden outright.
    #[must_use]
    pub fn read_only_hides_row(self) -> bool {
        self.contains(Self::READ_ONLY_HIDES_ROW | Self::HONOR_HIDE)
    }

    /// Parse a comma separated list of flag names, e.g.
    /// `"HONOR_HIDE, read_only_hides_row"`. Names are case-insensitive and
    /// `-` is accepted in place of `_`.
    pub fn parse_list(list: &str) -> Result<Self, ConfigError> {
        let mut flags = Self::empty();
        for raw in list.split(',') {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            let normalized = name.to_ascii_uppercase().replace('-', "_");
            let flag = Self::from_name(&normalized).ok_or_else(|| ConfigError::UnknownFlag {
                name: name.to_string(),
            })?;
            flags |= flag;
        }
        Ok(flags)
    }
}

bitflags! {
    /// Capabilities of a single cell, as reported to the view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        const SELECTABLE     = 1;
        const EDITABLE       = 1 << 1;
        const USER_CHECKABLE = 1 << 2;
        const ENABLED        = 1 << 3;
    }
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self::ENABLED | Self::SELECTABLE
    }
}

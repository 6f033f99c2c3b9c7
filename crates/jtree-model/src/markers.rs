//! Reserved JSON keys and marker helpers.
//!
//! Markers are plain fields in a node's map. Column-scoped markers append the
//! column tag after a colon, e.g. `_hide_:price` or `_readonly_:name`.

use serde_json::{Map, Value};

use crate::policy::ItemFlags;

/// Array of child objects; stripped from node maps and regenerated on save.
pub const CHILDREN: &str = "_children_";
/// Column descriptor string.
pub const HEADERS: &str = "_headers_";
/// Embedded tree object that replaces the top-level object on load.
pub const BLOB: &str = "_blob_";
pub const TEMPLATE: &str = "_template_";
pub const HIDE: &str = "_hide_";
pub const READONLY: &str = "_readonly_";
pub const WIDGET: &str = "_widget_";
/// Derived cache: set while any key of the map contains `_readonly_`.
pub const HAS_RO_SET: &str = "__hasROSet__";

/// Key prefixes removed when saving with descriptive stripping enabled.
pub const DESCRIPTIVE_PREFIXES: [&str; 11] = [
    "_widget_",
    "_headers_",
    "_desc_",
    "_valuemin_",
    "_valuemax_",
    "_valuelist_",
    "_regexp_",
    "_readonly_",
    "_hide_",
    "_template_",
    "_mandatory_",
];

/// Edit capabilities contributed by a `_widget_:<tag>` kind.
pub const WIDGET_FLAGS: [(&str, ItemFlags); 6] = [
    ("Tree", ItemFlags::empty()),
    (
        "QCheckBox",
        ItemFlags::EDITABLE.union(ItemFlags::USER_CHECKABLE),
    ),
    ("QComboBox", ItemFlags::EDITABLE),
    ("QLineEdit", ItemFlags::EDITABLE),
    ("QPushButton", ItemFlags::empty()),
    ("QSpinBox", ItemFlags::EDITABLE),
];

/// `"<marker>:<tag>"`.
#[must_use]
pub fn column_marker(marker: &str, tag: &str) -> String {
    format!("{marker}:{tag}")
}

/// Variant-style boolean conversion used for every marker value.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Truthiness of `map[key]`, false when absent.
#[must_use]
pub fn flag(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).is_some_and(is_truthy)
}

#[must_use]
pub fn is_descriptive(key: &str) -> bool {
    DESCRIPTIVE_PREFIXES.iter().any(|prefix| {
        key.len() >= prefix.len()
            && key.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    })
}

/// Flags for a widget descriptor such as `"QPushButton,Go"`.
#[must_use]
pub fn widget_flags(descriptor: &str) -> ItemFlags {
    let kind = descriptor.split(',').next().unwrap_or_default().trim();
    WIDGET_FLAGS
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, flags)| *flags)
        .unwrap_or_else(ItemFlags::empty)
}

/// Display text of a field value.
#[must_use]
pub fn display_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

//! Document configuration and `key=value` profile parsing.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::policy::SpecialFlags;

/// Highest document `version` accepted by default.
pub const MAX_SUPPORTED_VERSION: i64 = 3;
/// Children revealed per `fetch_more` by default.
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_VERSION_KEY: &str = "version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    pub max_supported_version: i64,
    pub page_size: usize,
    pub version_key: String,
    pub special_flags: SpecialFlags,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_supported_version: MAX_SUPPORTED_VERSION,
            page_size: DEFAULT_PAGE_SIZE,
            version_key: DEFAULT_VERSION_KEY.to_string(),
            special_flags: SpecialFlags::default(),
        }
    }
}

impl DocumentConfig {
    #[must_use]
    pub fn with_max_supported_version(mut self, version: i64) -> Self {
        self.max_supported_version = version;
        self
    }

    /// Zero is clamped to one so fetching always makes progress.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_version_key(mut self, key: impl Into<String>) -> Self {
        self.version_key = key.into();
        self
    }

    #[must_use]
    pub fn with_special_flags(mut self, flags: SpecialFlags) -> Self {
        self.special_flags = flags;
        self
    }

    /// Build from profile text such as:
    ///
    /// ```text
    /// # jtree profile
    /// max_version=3
    /// page_size=50
    /// version_key="schema_version"
    /// flags=HONOR_HIDE,READ_ONLY_HIDES_ROW
    /// ```
    ///
    /// Missing keys keep their defaults; unknown keys are ignored.
    pub fn from_profile(content: &str) -> Result<Self, ConfigError> {
        let values = parse_profile_content(content);
        let mut config = Self::default();

        if let Some(raw) = values.get("max_version") {
            config.max_supported_version = parse_number(raw, "max_version")?;
        }
        if let Some(raw) = values.get("page_size") {
            config = config.with_page_size(parse_number(raw, "page_size")?);
        }
        if let Some(raw) = values.get("version_key") {
            if raw.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "version_key".to_string(),
                    value: raw.clone(),
                });
            }
            config.version_key = raw.clone();
        }
        if let Some(raw) = values.get("flags") {
            config.special_flags = SpecialFlags::parse_list(raw)?;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

/// Split `key=value` lines, skipping blanks and `#` comments and unquoting
/// double-quoted values.
#[must_use]
pub fn parse_profile_content(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim().to_string();
        let mut value = value_raw.trim().to_string();

        if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            value = value[1..value.len() - 1].to_string();
        }

        values.insert(key, value);
    }

    values
}

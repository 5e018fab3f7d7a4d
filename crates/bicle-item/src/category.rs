use std::fmt;

use serde::{Deserialize, Serialize};

/// Topic a news item is filed under.
///
/// Categories are plain labels normalised to trimmed lowercase so that
/// `"Tech"` and `" tech "` name the same allow-list entry and fingerprint
/// identically.  Which categories are accepted is decided by node
/// configuration, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_lowercase())
    }

    /// The default category carried by every configured feed.
    pub fn tech() -> Self {
        Self::new("tech")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

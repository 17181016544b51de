use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized name-or-spec text that groups ledger entries of the same item.
///
/// Leading and trailing whitespace is dropped and inner runs of whitespace
/// collapse to a single space, so `" D13  rebar"` and `"D13 rebar"` land in
/// the same group. Case is preserved: `"D13"` and `"d13"` are different
/// items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for GroupKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for GroupKey {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<GroupKey> for String {
    fn from(key: GroupKey) -> Self {
        key.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

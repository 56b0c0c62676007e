use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer-backed entity identity. `UNSET` marks an entity that has not been
/// persisted yet; the store assigns the real value on first insert and it is
/// never re-assigned afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefId(i64);

impl RefId {
    pub const UNSET: RefId = RefId(-1);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl Default for RefId {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RefId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::RefId;

    #[test]
    fn unset_sentinel_is_distinct() {
        assert!(RefId::UNSET.is_unset());
        assert!(RefId::default().is_unset());
        assert!(!RefId::new(1).is_unset());
    }

    #[test]
    fn displays_as_plain_integer() {
        assert_eq!(RefId::new(42).to_string(), "42");
    }
}

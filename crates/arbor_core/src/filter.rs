use crate::{EnumValue, FieldValue};

/// One end of a range filter.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeBound {
    pub value: FieldValue,
    pub inclusive: bool,
}

impl RangeBound {
    pub fn inclusive(value: FieldValue) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: FieldValue) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// Filter vocabulary accepted by `find_all_generic`. The store compiles
/// these into backend predicates; unknown columns and kind mismatches are
/// rejected at composition time.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterSpec {
    Equals(FieldValue),
    OneOf(Vec<FieldValue>),
    Range {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
    IsNull,
    IsNotNull,
}

impl FilterSpec {
    pub fn between(lower: RangeBound, upper: RangeBound) -> Self {
        Self::Range {
            lower: Some(lower),
            upper: Some(upper),
        }
    }
}

/// Which rows a read admits with respect to soft-archival. Replaces the
/// source's bool-or-enum-or-list parameter with a tagged variant matched
/// exhaustively in the query builder.
#[derive(Clone, Debug, PartialEq)]
pub enum ArchiveScope {
    /// Exclude archived rows.
    Live,
    /// Include every row.
    All,
    /// Live rows, plus archived rows whose `archival_reason` matches.
    Reason(String),
    /// Live rows, plus archived rows whose `archival_reason` is in the list.
    Reasons(Vec<String>),
}

impl ArchiveScope {
    pub fn reason(value: &impl EnumValue) -> Self {
        Self::Reason(value.as_str().to_owned())
    }

    pub fn reasons<'a, T: EnumValue>(values: impl IntoIterator<Item = &'a T>) -> Self {
        Self::Reasons(
            values
                .into_iter()
                .map(|value| value.as_str().to_owned())
                .collect(),
        )
    }

    pub fn names_reasons(&self) -> bool {
        matches!(self, Self::Reason(_) | Self::Reasons(_))
    }

    /// Single-row visibility check. An archived row with no recorded reason
    /// is visible only under `All`.
    pub fn admits(&self, archived: bool, archival_reason: Option<&str>) -> bool {
        if !archived {
            return true;
        }
        match self {
            Self::Live => false,
            Self::All => true,
            Self::Reason(reason) => archival_reason == Some(reason.as_str()),
            Self::Reasons(reasons) => archival_reason
                .map(|actual| reasons.iter().any(|reason| reason == actual))
                .unwrap_or(false),
        }
    }
}

impl Default for ArchiveScope {
    fn default() -> Self {
        Self::Live
    }
}

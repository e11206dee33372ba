use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Direction of the single sort key of a paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[strum(serialize = "ASC")]
    #[serde(alias = "ASC", alias = "1")]
    Asc,
    #[strum(serialize = "DESC")]
    #[serde(alias = "DESC", alias = "-1")]
    Desc,
}

impl SortOrder {
    /// `+1` / `-1` encoding used by document-store sort specs.
    pub fn as_sign(self) -> i64 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

impl From<i64> for SortOrder {
    fn from(sign: i64) -> Self {
        if sign < 0 {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

impl From<i32> for SortOrder {
    fn from(sign: i32) -> Self {
        SortOrder::from(i64::from(sign))
    }
}

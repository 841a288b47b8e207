use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use billing_service::EntryType;

use crate::error::AccountingError;

/// Dimension a summary is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Department,
    Vertical,
    /// Calendar month of the entry date, keyed `YYYY-MM`
    Month,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupBy::Department => "department",
            GroupBy::Vertical => "vertical",
            GroupBy::Month => "month",
        })
    }
}

impl FromStr for GroupBy {
    type Err = AccountingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "department" => Ok(GroupBy::Department),
            "vertical" => Ok(GroupBy::Vertical),
            "month" => Ok(GroupBy::Month),
            other => Err(AccountingError::Validation(format!("cannot group by {other}"))),
        }
    }
}

/// Restricts which entries a summary covers. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFilter {
    pub entry_type: Option<EntryType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Net signed total of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub key: String,
    pub total: Decimal,
    pub entry_count: usize,
}

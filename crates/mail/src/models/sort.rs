//! Caller-selectable ordering for store reads

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Sort order for record listings
///
/// Parsed from `date_newest`, `date_oldest`, `sender_asc` or `sender_desc`.
/// Any other value falls back to [`SortOrder::Inserted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest `Date` header first
    DateNewest,
    /// Oldest `Date` header first
    DateOldest,
    /// Sender A-Z, newest first within a sender
    SenderAsc,
    /// Sender Z-A, newest first within a sender
    SenderDesc,
    /// Most recently inserted first
    #[default]
    Inserted,
}

impl SortOrder {
    /// The four named orders
    pub const NAMED: [SortOrder; 4] = [
        SortOrder::DateNewest,
        SortOrder::DateOldest,
        SortOrder::SenderAsc,
        SortOrder::SenderDesc,
    ];

    /// Parse a sort descriptor, falling back to insertion order
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "date_newest" => SortOrder::DateNewest,
            "date_oldest" => SortOrder::DateOldest,
            "sender_asc" => SortOrder::SenderAsc,
            "sender_desc" => SortOrder::SenderDesc,
            _ => SortOrder::Inserted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::DateNewest => "date_newest",
            SortOrder::DateOldest => "date_oldest",
            SortOrder::SenderAsc => "sender_asc",
            SortOrder::SenderDesc => "sender_desc",
            SortOrder::Inserted => "inserted",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_orders() {
        assert_eq!(SortOrder::parse("date_newest"), SortOrder::DateNewest);
        assert_eq!(SortOrder::parse("date_oldest"), SortOrder::DateOldest);
        assert_eq!(SortOrder::parse("sender_asc"), SortOrder::SenderAsc);
        assert_eq!(SortOrder::parse("sender_desc"), SortOrder::SenderDesc);
    }

    #[test]
    fn test_parse_unknown_falls_back_to_inserted() {
        assert_eq!(SortOrder::parse(""), SortOrder::Inserted);
        assert_eq!(SortOrder::parse("DATE_NEWEST"), SortOrder::Inserted);
        assert_eq!(SortOrder::parse("created_at; DROP TABLE emails"), SortOrder::Inserted);
        assert_eq!(SortOrder::default(), SortOrder::Inserted);
    }

    #[test]
    fn test_as_str_round_trips_named_orders() {
        for order in SortOrder::NAMED {
            assert_eq!(order.as_str().parse::<SortOrder>().unwrap(), order);
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// Cycle a coupon count falls into. `NotApplicable` orders after every
/// numbered cycle so it lands last in sorted aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cycle {
    Number(u64),
    NotApplicable,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::Number(n) => write!(f, "{n}"),
            Cycle::NotApplicable => f.write_str("NA"),
        }
    }
}

impl FromStr for Cycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("NA") {
            return Ok(Cycle::NotApplicable);
        }
        trimmed
            .parse::<u64>()
            .map(Cycle::Number)
            .map_err(|_| format!("invalid cycle '{trimmed}'"))
    }
}

impl Serialize for Cycle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cycle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub user_id: Option<String>,
    pub username: String,
    pub phone_number: String,
    pub coupon_cards: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: Record,
    pub cycle: Cycle,
    pub level: u32,
}

impl ClassifiedRecord {
    pub fn cycle_level(&self) -> String {
        format!("{}-{}", self.cycle, self.level)
    }
}

/// One bar of a grouped summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateGroup<K> {
    pub key: K,
    pub user_count: usize,
    pub record_count: usize,
    pub users: String,
}

/// Composite key for the cycle/level grouping. Sorts by cycle, then level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleLevel {
    pub cycle: Cycle,
    pub level: u32,
}

impl fmt::Display for CycleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.cycle, self.level)
    }
}

impl Serialize for CycleLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A data row that was left out of classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based data row number, header excluded.
    pub row: usize,
    pub column: String,
    pub value: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ValueError,
}

fn serialize_display<S: Serializer>(value: &ValueError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryMetrics {
    pub total_rows: usize,
    pub distinct_users: usize,
    pub min_coupons: Option<u64>,
    pub max_coupons: Option<u64>,
    pub max_level: Option<u32>,
}

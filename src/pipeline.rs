//! Classify, filter, search and aggregate one dataset.
//!
//! Every stage takes and returns plain ordered `Vec`s; nothing here keeps
//! state between runs. The caller owns the [`Session`] that parameterizes a
//! run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use uuid::Uuid;

use crate::classifier::BandScheme;
use crate::error::PipelineError;
use crate::ingest::{self, InputRow};
use crate::models::{
    AggregateGroup, ClassifiedRecord, Cycle, CycleLevel, Record, RowIssue, SummaryMetrics,
};

/// Caller-supplied coupon bounds; unset ends default to the dataset's
/// observed minimum and maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeRequest {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

/// Inclusive coupon range actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CouponRange {
    pub min: u64,
    pub max: u64,
}

impl CouponRange {
    pub fn contains(&self, coupons: u64) -> bool {
        self.min <= coupons && coupons <= self.max
    }
}

/// Everything one pipeline run depends on besides the data itself.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub scheme: BandScheme,
    pub range: RangeRequest,
    pub search: Option<String>,
    /// Abort on the first bad row instead of reporting it and carrying on.
    pub strict: bool,
}

impl Session {
    pub fn new(scheme: BandScheme) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheme,
            range: RangeRequest::default(),
            search: None,
            strict: false,
        }
    }

    pub fn with_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.range = RangeRequest { min, max };
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub session_id: Uuid,
    #[serde(skip)]
    pub records: Vec<ClassifiedRecord>,
    /// `None` when no classified row falls inside the requested range.
    pub range: Option<CouponRange>,
    pub summary: SummaryMetrics,
    pub by_cycle: Vec<AggregateGroup<Cycle>>,
    pub by_level: Vec<AggregateGroup<u32>>,
    pub by_cycle_level: Vec<AggregateGroup<CycleLevel>>,
    pub issues: Vec<RowIssue>,
}

pub fn run_pipeline(session: &Session, rows: Vec<InputRow>) -> Result<PipelineOutput, PipelineError> {
    let total = rows.len();
    let (classified, issues) = classify_rows(&session.scheme, rows, session.strict)?;
    for issue in &issues {
        log::warn!(
            "Row {}: skipped {} value '{}': {}",
            issue.row,
            issue.column,
            issue.value,
            issue.error
        );
    }

    let range = resolve_range(session.range, observed_range(&classified))?;
    let in_range = match range {
        Some(range) => filter_range(classified, range),
        None => Vec::new(),
    };
    let records = search(in_range, session.search.as_deref());

    log::info!(
        "Session {}: {} of {} rows kept ({} skipped)",
        session.id,
        records.len(),
        total,
        issues.len()
    );

    Ok(PipelineOutput {
        session_id: session.id,
        range,
        summary: summarize(&records),
        by_cycle: aggregate_by(&records, |r| r.cycle),
        by_level: aggregate_by(&records, |r| r.level),
        by_cycle_level: aggregate_by(&records, |r| CycleLevel {
            cycle: r.cycle,
            level: r.level,
        }),
        records,
        issues,
    })
}

/// Coerce and classify each row. Rows that fail are returned as issues in
/// input order, or abort the run when `strict` is set.
pub fn classify_rows(
    scheme: &BandScheme,
    rows: Vec<InputRow>,
    strict: bool,
) -> Result<(Vec<ClassifiedRecord>, Vec<RowIssue>), PipelineError> {
    let mut classified = Vec::with_capacity(rows.len());
    let mut issues = Vec::new();

    for row in rows {
        let outcome = ingest::parse_coupon_count(&row.coupon_cards)
            .and_then(|count| scheme.classify(count).map(|class| (count, class)));

        match outcome {
            Ok((count, (cycle, level))) => {
                log::debug!("Row {}: {} coupons -> cycle {cycle}, level {level}", row.row, count);
                classified.push(ClassifiedRecord {
                    record: Record {
                        user_id: row.user_id,
                        username: row.username,
                        phone_number: row.phone_number,
                        coupon_cards: count as u64,
                    },
                    cycle,
                    level,
                });
            }
            Err(error) if strict => {
                return Err(PipelineError::Row {
                    row: row.row,
                    value: row.coupon_cards,
                    error,
                });
            }
            Err(error) => issues.push(RowIssue {
                row: row.row,
                column: "coupon_cards".to_string(),
                value: row.coupon_cards,
                error,
            }),
        }
    }

    Ok((classified, issues))
}

pub fn observed_range(records: &[ClassifiedRecord]) -> Option<CouponRange> {
    let min = records.iter().map(|r| r.record.coupon_cards).min()?;
    let max = records.iter().map(|r| r.record.coupon_cards).max()?;
    Some(CouponRange { min, max })
}

/// Intersect the requested range with the observed one; unset ends default
/// to the observed bounds. `None` means no row can be selected, either
/// because the dataset is empty or because the request misses the data.
pub fn resolve_range(
    request: RangeRequest,
    observed: Option<CouponRange>,
) -> Result<Option<CouponRange>, PipelineError> {
    if let (Some(min), Some(max)) = (request.min, request.max) {
        if min > max {
            return Err(PipelineError::Range { min, max });
        }
    }

    let Some(observed) = observed else {
        return Ok(None);
    };

    let min = request.min.map_or(observed.min, |min| min.max(observed.min));
    let max = request.max.map_or(observed.max, |max| max.min(observed.max));
    Ok((min <= max).then_some(CouponRange { min, max }))
}

pub fn filter_range(records: Vec<ClassifiedRecord>, range: CouponRange) -> Vec<ClassifiedRecord> {
    records
        .into_iter()
        .filter(|r| range.contains(r.record.coupon_cards))
        .collect()
}

/// Username matches ignore case; phone numbers must contain the needle as is.
/// A blank needle keeps everything.
pub fn search(records: Vec<ClassifiedRecord>, needle: Option<&str>) -> Vec<ClassifiedRecord> {
    let needle = match needle {
        Some(needle) if !needle.trim().is_empty() => needle,
        _ => return records,
    };
    let lowered = needle.to_lowercase();

    records
        .into_iter()
        .filter(|r| {
            r.record.username.to_lowercase().contains(&lowered)
                || r.record.phone_number.contains(needle)
        })
        .collect()
}

/// Group records by `key`, counting distinct usernames per group. Groups come
/// back in ascending key order.
pub fn aggregate_by<K, F>(records: &[ClassifiedRecord], key: F) -> Vec<AggregateGroup<K>>
where
    K: Ord,
    F: Fn(&ClassifiedRecord) -> K,
{
    let mut groups: BTreeMap<K, (usize, BTreeSet<&str>)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(key(record)).or_default();
        entry.0 += 1;
        entry.1.insert(record.record.username.as_str());
    }

    groups
        .into_iter()
        .map(|(key, (record_count, users))| AggregateGroup {
            key,
            user_count: users.len(),
            record_count,
            users: users.into_iter().collect::<Vec<_>>().join(", "),
        })
        .collect()
}

pub fn distinct_users(records: &[ClassifiedRecord]) -> usize {
    records
        .iter()
        .map(|r| r.record.username.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

pub fn summarize(records: &[ClassifiedRecord]) -> SummaryMetrics {
    let range = observed_range(records);
    SummaryMetrics {
        total_rows: records.len(),
        distinct_users: distinct_users(records),
        min_coupons: range.map(|r| r.min),
        max_coupons: range.map(|r| r.max),
        max_level: records.iter().map(|r| r.level).max(),
    }
}

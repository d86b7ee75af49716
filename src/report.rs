use std::fmt::{Display, Write};

use chrono::NaiveDate;

use crate::classifier::BandScheme;
use crate::models::AggregateGroup;
use crate::pipeline::PipelineOutput;

fn optional<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn write_groups<K: Display>(output: &mut String, title: &str, groups: &[AggregateGroup<K>]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");

    if groups.is_empty() {
        let _ = writeln!(output, "No records in this selection.");
        return;
    }

    let _ = writeln!(output, "| Key | Users | Records | Members |");
    let _ = writeln!(output, "| --- | ---: | ---: | --- |");
    for group in groups {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            group.key, group.user_count, group.record_count, group.users
        );
    }
}

pub fn build_report(
    source: &str,
    generated_on: NaiveDate,
    scheme: &BandScheme,
    search: Option<&str>,
    result: &PipelineOutput,
) -> String {
    let mut output = String::new();
    let summary = &result.summary;

    let _ = writeln!(output, "# Coupon Level & Cycle Distribution");
    let _ = writeln!(output, "Generated on {generated_on} from {source}");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Scheme: {}-coupon cycles, first cycle at {}, level bounds {:?}",
        scheme.cycle_length(),
        scheme.na_threshold(),
        scheme.band_upper_bounds()
    );
    match result.range {
        Some(range) => {
            let _ = writeln!(output, "Coupon range: {} to {}", range.min, range.max);
        }
        None => {
            let _ = writeln!(output, "Coupon range: no rows in range");
        }
    }
    if let Some(needle) = search.filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(output, "Search: \"{needle}\"");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary Metrics");
    let _ = writeln!(output, "- Total rows: {}", summary.total_rows);
    let _ = writeln!(output, "- Distinct users: {}", summary.distinct_users);
    let _ = writeln!(output, "- Min coupons: {}", optional(summary.min_coupons));
    let _ = writeln!(output, "- Max coupons: {}", optional(summary.max_coupons));
    let _ = writeln!(output, "- Max level: {}", optional(summary.max_level));

    write_groups(&mut output, "Users by Cycle", &result.by_cycle);
    write_groups(&mut output, "Users by Level", &result.by_level);
    write_groups(&mut output, "Users by Cycle-Level", &result.by_cycle_level);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Skipped Rows");

    if result.issues.is_empty() {
        let _ = writeln!(output, "No rows were skipped.");
    } else {
        let _ = writeln!(output, "{} rows were left out:", result.issues.len());
        for issue in &result.issues {
            let _ = writeln!(
                output,
                "- row {}: {} '{}' ({})",
                issue.row, issue.column, issue.value, issue.error
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::InputRow;
    use crate::pipeline::{run_pipeline, Session};

    fn input(row: usize, username: &str, coupons: &str) -> InputRow {
        InputRow {
            row,
            user_id: Some(format!("id-{row}")),
            username: username.to_string(),
            phone_number: format!("07000000{row:02}"),
            coupon_cards: coupons.to_string(),
        }
    }

    fn generated_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn report_lists_metrics_groups_and_skipped_rows() {
        let scheme = BandScheme::canonical();
        let rows = vec![
            input(1, "Amani", "5"),
            input(2, "Baraka", "41"),
            input(3, "Chege", "oops"),
            input(4, "Amani", "82"),
        ];
        let result = run_pipeline(&Session::new(scheme.clone()), rows).unwrap();
        let report = build_report("members.csv", generated_on(), &scheme, None, &result);

        assert!(report.contains("Generated on 2026-10-19 from members.csv"));
        assert!(report.contains("Coupon range: 5 to 82"));
        assert!(report.contains("- Total rows: 3"));
        assert!(report.contains("- Distinct users: 2"));
        assert!(report.contains("- Max level: 6"));
        assert!(report.contains("| 1 | 1 | 1 | Baraka |"));
        assert!(report.contains("| NA | 1 | 1 | Amani |"));
        assert!(report.contains("| 6 | 2 | 2 | Amani, Baraka |"));
        assert!(report.contains("| 2-6 | 1 | 1 | Amani |"));
        assert!(report.contains("- row 3: coupon_cards 'oops' (coupon count is not a number)"));
        assert!(!report.contains("Search:"));
    }

    #[test]
    fn empty_selection_is_reported_plainly() {
        let scheme = BandScheme::canonical();
        let session = Session::new(scheme.clone()).with_search(Some("nobody".to_string()));
        let result = run_pipeline(&session, vec![input(1, "Amani", "5")]).unwrap();
        let report = build_report("members.csv", generated_on(), &scheme, Some("nobody"), &result);

        assert!(report.contains("Search: \"nobody\""));
        assert!(report.contains("- Total rows: 0"));
        assert!(report.contains("- Max level: -"));
        assert!(report.contains("No records in this selection."));
        assert!(report.contains("No rows were skipped."));
    }

    #[test]
    fn range_that_misses_the_data_is_reported() {
        let scheme = BandScheme::canonical();
        let session = Session::new(scheme.clone()).with_range(Some(100), Some(200));
        let result = run_pipeline(&session, vec![input(1, "Amani", "5")]).unwrap();
        let report = build_report("members.csv", generated_on(), &scheme, None, &result);

        assert!(report.contains("Coupon range: no rows in range"));
        assert!(report.contains("- Total rows: 0"));
    }
}

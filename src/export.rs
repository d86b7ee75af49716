use std::io::Write;
use std::path::Path;

use anyhow::Context;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::{Deserialize, Serialize};

use crate::models::{AggregateGroup, ClassifiedRecord, Cycle};
use crate::pipeline::PipelineOutput;

pub const EXPORT_COLUMNS: [&str; 6] = [
    "username",
    "phone_number",
    "coupon_cards",
    "cycle",
    "level",
    "cycle_level",
];

pub const DEFAULT_EXPORT_NAME: &str = "coupon_level_cycle_output.csv";

/// One line of the exported result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub username: String,
    pub phone_number: String,
    pub coupon_cards: u64,
    pub cycle: Cycle,
    pub level: u32,
    pub cycle_level: String,
}

impl From<&ClassifiedRecord> for ExportRow {
    fn from(record: &ClassifiedRecord) -> Self {
        Self {
            username: record.record.username.clone(),
            phone_number: record.record.phone_number.clone(),
            coupon_cards: record.record.coupon_cards,
            cycle: record.cycle,
            level: record.level,
            cycle_level: record.cycle_level(),
        }
    }
}

/// Write the records as CSV. The header row is written even when there are
/// no records.
pub fn write_csv<W: Write>(output: W, records: &[ClassifiedRecord]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(EXPORT_COLUMNS)?;
    for record in records {
        writer.serialize(ExportRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_bytes(records: &[ClassifiedRecord]) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    Ok(buffer)
}

pub fn save_csv(path: &Path, records: &[ClassifiedRecord]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(std::io::BufWriter::new(file), records)
}

/// Parse a previously exported table back into rows.
pub fn parse_csv(data: &[u8]) -> anyhow::Result<Vec<ExportRow>> {
    let mut reader = csv::Reader::from_reader(data);
    let rows = reader
        .deserialize::<ExportRow>()
        .collect::<Result<Vec<_>, _>>()
        .context("failed to read exported rows")?;
    Ok(rows)
}

/// Write the result table plus one sheet per grouping.
pub fn save_workbook(path: &Path, output: &PipelineOutput) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Output")?;
    for (col, name) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    for (index, record) in output.records.iter().enumerate() {
        let row = index as u32 + 1;
        let line = ExportRow::from(record);
        sheet.write_string(row, 0, &line.username)?;
        sheet.write_string(row, 1, &line.phone_number)?;
        sheet.write_number(row, 2, line.coupon_cards as f64)?;
        match line.cycle {
            Cycle::Number(n) => sheet.write_number(row, 3, n as f64)?,
            Cycle::NotApplicable => sheet.write_string(row, 3, "NA")?,
        };
        sheet.write_number(row, 4, line.level as f64)?;
        sheet.write_string(row, 5, &line.cycle_level)?;
    }
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(1, 16)?;

    write_groups(workbook.add_worksheet(), "By Cycle", &output.by_cycle, &bold)?;
    write_groups(workbook.add_worksheet(), "By Level", &output.by_level, &bold)?;
    write_groups(
        workbook.add_worksheet(),
        "By Cycle-Level",
        &output.by_cycle_level,
        &bold,
    )?;

    workbook
        .save(path)
        .with_context(|| format!("failed to write workbook {}", path.display()))?;
    Ok(())
}

fn write_groups<K: std::fmt::Display>(
    sheet: &mut Worksheet,
    name: &str,
    groups: &[AggregateGroup<K>],
    bold: &Format,
) -> anyhow::Result<()> {
    sheet.set_name(name)?;
    for (col, header) in ["key", "user_count", "record_count", "users"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, bold)?;
    }
    for (index, group) in groups.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, group.key.to_string())?;
        sheet.write_number(row, 1, group.user_count as f64)?;
        sheet.write_number(row, 2, group.record_count as f64)?;
        sheet.write_string(row, 3, &group.users)?;
    }
    sheet.set_column_width(3, 60)?;
    Ok(())
}

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};

use crate::error::{PipelineError, ValueError};

pub const REQUIRED_COLUMNS: [&str; 4] = ["user_id", "username", "phone_number", "coupon_cards"];

/// A data row as read from the file, before the coupon count is coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// 1-based data row number, header excluded.
    pub row: usize,
    pub user_id: Option<String>,
    pub username: String,
    pub phone_number: String,
    pub coupon_cards: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Delimited(u8),
    Workbook,
}

pub fn input_format(path: &Path) -> InputFormat {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => InputFormat::Workbook,
        "tsv" | "tab" => InputFormat::Delimited(b'\t'),
        _ => InputFormat::Delimited(b','),
    }
}

/// Read a delimited file or the first sheet of a workbook. An explicit
/// delimiter overrides the one implied by the extension of a text file.
pub fn read_path(path: &Path, delimiter: Option<u8>) -> Result<Vec<InputRow>, PipelineError> {
    log::debug!("Reading {}", path.display());
    match input_format(path) {
        InputFormat::Workbook => read_workbook(path),
        InputFormat::Delimited(inferred) => {
            let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            read_rows(file, delimiter.unwrap_or(inferred))
        }
    }
}

/// Positions of the required columns, in `REQUIRED_COLUMNS` order.
fn locate_columns(headers: &[String]) -> Result<[usize; 4], PipelineError> {
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
    };

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| column(**name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(PipelineError::Schema { missing });
    }

    Ok(REQUIRED_COLUMNS.map(|name| column(name).unwrap_or_default()))
}

fn input_row<'a>(row: usize, columns: [usize; 4], cell: impl Fn(usize) -> &'a str) -> InputRow {
    let [user_id_idx, username_idx, phone_idx, coupons_idx] = columns;
    let user_id = cell(user_id_idx).trim();

    InputRow {
        row,
        user_id: (!user_id.is_empty()).then(|| user_id.to_string()),
        username: cell(username_idx).trim().to_string(),
        phone_number: cell(phone_idx).trim().to_string(),
        coupon_cards: cell(coupons_idx).trim().to_string(),
    }
}

/// Validate the header against the required columns, then collect every row.
/// Extra columns are ignored; short rows read as empty cells.
pub fn read_rows<R: Read>(input: R, delimiter: u8) -> Result<Vec<InputRow>, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = locate_columns(&headers)?;

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        rows.push(input_row(index + 1, columns, |idx| {
            record.get(idx).unwrap_or("")
        }));
    }

    Ok(rows)
}

/// Text form of a sheet cell. Whole floats drop their fraction so phone
/// numbers and counts stored as numbers read back as digits.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Read the first sheet of a workbook; its first row is the header.
pub fn read_workbook(path: &Path) -> Result<Vec<InputRow>, PipelineError> {
    std::fs::metadata(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut workbook = open_workbook_auto(path)?;

    let Some(range) = workbook.worksheet_range_at(0) else {
        return Err(PipelineError::Schema {
            missing: sorted_required(),
        });
    };
    let range = range?;

    let mut sheet_rows = range
        .rows()
        .map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>());
    let headers = sheet_rows.next().unwrap_or_default();
    let columns = locate_columns(&headers)?;

    Ok(sheet_rows
        .enumerate()
        .map(|(index, cells)| {
            input_row(index + 1, columns, |idx| {
                cells.get(idx).map(String::as_str).unwrap_or("")
            })
        })
        .collect())
}

fn sorted_required() -> Vec<String> {
    let mut names: Vec<String> = REQUIRED_COLUMNS.iter().map(|n| n.to_string()).collect();
    names.sort();
    names
}

/// Coerce a coupon cell to an integer. Whole-valued decimals such as `12.0`
/// are accepted since spreadsheet exports write counts that way.
pub fn parse_coupon_count(raw: &str) -> Result<i64, ValueError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValueError::Missing);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }

    let value: f64 = trimmed.parse().map_err(|_| ValueError::NonNumeric)?;
    if !value.is_finite() {
        return Err(ValueError::NonNumeric);
    }
    if value.fract() != 0.0 {
        return Err(ValueError::Fractional);
    }
    if value.abs() >= i64::MAX as f64 {
        return Err(ValueError::OutOfRange);
    }
    Ok(value as i64)
}

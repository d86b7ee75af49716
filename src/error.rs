//! Error taxonomy for classification and the dataset pipeline.

use std::path::PathBuf;

/// Why a single coupon value could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("coupon count is missing")]
    Missing,

    #[error("coupon count is not a number")]
    NonNumeric,

    #[error("coupon count is not a whole number")]
    Fractional,

    #[error("coupon count is too large")]
    OutOfRange,

    #[error("coupon count {0} is negative")]
    Negative(i64),

    #[error("coupon count of zero is rejected by this scheme")]
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemeError {
    #[error("cycle length must be at least 1")]
    EmptyCycle,

    #[error("band upper bounds must be strictly ascending (bound {index} is {bound})")]
    BoundsNotAscending { index: usize, bound: u64 },

    #[error("band upper bound {bound} must be below the cycle length {cycle_length}")]
    BoundOutOfRange { bound: u64, cycle_length: u64 },

    #[error("unknown scheme preset '{0}'")]
    UnknownPreset(String),
}

/// Failures that abort a whole pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("dataset is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse tabular data: {0}")]
    Parse(#[from] csv::Error),

    #[error("could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("coupon range {min}..={max} is inverted")]
    Range { min: u64, max: u64 },

    #[error("invalid band scheme: {0}")]
    Scheme(#[from] SchemeError),

    #[error("row {row}: {error} (value '{value}')")]
    Row {
        row: usize,
        value: String,
        error: ValueError,
    },
}

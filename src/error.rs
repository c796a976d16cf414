use std::path::PathBuf;
use thiserror::Error;

use crate::money::Money;

/// Malformed or out-of-range arguments to the billing functions.
/// Always raised before anything is persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{field} cannot be negative (got {amount})")]
    NegativeAmount { field: &'static str, amount: Money },

    #[error("Course duration must be at least one month (got {0})")]
    NonPositiveDuration(i32),

    #[error("Installment count must be between 2 and 12 (got {0})")]
    InstallmentCount(u32),

    #[error("Amount paid {paid} exceeds the total of {total}")]
    AmountPaidExceedsTotal { paid: Money, total: Money },

    #[error("Invalid percentage '{0}'")]
    InvalidPercentage(String),

    #[error("Invalid discount '{0}'. Expected an amount (e.g., '2000') or a percentage (e.g., '10%')")]
    InvalidDiscount(String),

    #[error("Invalid amount '{0}'. Expected a number with at most two decimals")]
    InvalidAmount(String),

    #[error("Cutoff day must be between 1 and 31 (got {0})")]
    InvalidCutoffDay(u32),

    #[error("Payment amount must be greater than zero")]
    NonPositivePayment,

    #[error("{0} is too large to compute")]
    AmountOverflow(&'static str),
}

#[derive(Error, Debug)]
pub enum TuitionError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error("Invalid snapshot: {0}")]
    InvalidFormat(String),

    #[error("Config directory not found at {0}. Run 'tuition init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Course '{0}' not found")]
    CourseNotFound(String),

    #[error("Course fee '{0}' not found")]
    CourseFeeNotFound(String),

    #[error("Fee '{0}' not found")]
    GeneralFeeNotFound(String),

    #[error("Student '{0}' not found")]
    StudentNotFound(String),

    #[error("Course '{0}' is not open for admission")]
    AdmissionClosed(String),

    #[error("A fee record already exists for course '{0}'. Use 'course-fee update' instead.")]
    DuplicateCourseFee(String),

    #[error("Payment would exceed the amount due (max {max} remaining)")]
    OverPayment { student: String, max: Money },

    #[error("Import replaces every stored record. Re-run with --force to continue.")]
    ImportNotConfirmed,

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Failed to read or write {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TuitionError>;

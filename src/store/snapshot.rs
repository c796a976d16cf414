use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{Result, TuitionError};
use crate::money::Money;
use crate::store::{Course, CourseFee, GeneralFee, Student};
use crate::validation;

pub const SNAPSHOT_VERSION: &str = "1.0";

/// Whole-database export. Import only insists on `courses`; the other
/// collections default to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub courses: Vec<Course>,
    #[serde(default)]
    pub general_fees: Vec<GeneralFee>,
    #[serde(default)]
    pub course_fees: Vec<CourseFee>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

impl Snapshot {
    /// Parse and check a snapshot document without touching any store.
    pub fn parse(json: &str) -> Result<Snapshot> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| TuitionError::InvalidFormat(format!("not valid JSON: {e}")))?;

        if !value.get("courses").is_some_and(|c| c.is_array()) {
            return Err(TuitionError::InvalidFormat(
                "missing 'courses' array".to_string(),
            ));
        }

        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| TuitionError::InvalidFormat(e.to_string()))?;
        snapshot.check_consistency()?;
        Ok(snapshot)
    }

    fn check_consistency(&self) -> Result<()> {
        ensure_unique("course", self.courses.iter().map(|c| &c.id))?;
        ensure_unique("fee", self.general_fees.iter().map(|f| &f.id))?;
        ensure_unique("course fee", self.course_fees.iter().map(|f| &f.id))?;
        ensure_unique("student", self.students.iter().map(|s| &s.id))?;

        for course in &self.courses {
            validation::course_total(course.monthly_rate, course.duration_months)?;
        }

        let mut seen = HashSet::new();
        for fee in &self.course_fees {
            if !seen.insert(&fee.course_id) {
                return Err(TuitionError::InvalidFormat(format!(
                    "more than one course fee for course '{}'",
                    fee.course_id
                )));
            }
        }
        Ok(())
    }
}

fn ensure_unique<'a, T>(what: &str, ids: impl Iterator<Item = &'a T>) -> Result<()>
where
    T: Eq + Hash + std::fmt::Display + 'a,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(TuitionError::InvalidFormat(format!(
                "duplicate {what} id '{id}'"
            )));
        }
    }
    Ok(())
}

/// Result of the referential-integrity scan. Orphans are reported, never
/// removed here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub orphaned_fees: Vec<CourseFee>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub course_count: usize,
    pub general_fee_count: usize,
    pub course_fee_count: usize,
    pub student_count: usize,
    pub total_revenue: Money,
    pub total_paid: Money,
    pub total_due: Money,
    pub collection_rate_percent: f64,
}

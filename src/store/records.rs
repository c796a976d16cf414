use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::billing::{DiscountRequest, FeeBreakdown, PaymentPlan};
use crate::money::Money;

macro_rules! record_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

record_id!(CourseId, "course");
record_id!(CourseFeeId, "cfee");
record_id!(GeneralFeeId, "fee");
record_id!(StudentId, "student");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub monthly_rate: Money,
    pub duration_months: i32,
    #[serde(default = "default_true")]
    pub admission_open: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The effective monthly rate charged for a course (at most one per course).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFee {
    pub id: CourseFeeId,
    pub course_id: CourseId,
    pub monthly_rate: Money,
    pub fee_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A flat extra fee selectable at admission (admission form, uniform, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralFee {
    pub id: GeneralFeeId,
    pub fee_name: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[default]
    Full,
    Installments,
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMode::Full => write!(f, "full"),
            PaymentMode::Installments => write!(f, "installments"),
        }
    }
}

/// A student as admitted. `fee` and `plan` are frozen at admission; later
/// payments only move `fee.amount_paid` and `fee.amount_due`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    pub course_id: CourseId,
    pub admission_date: NaiveDate,
    #[serde(default)]
    pub extra_fee_ids: Vec<GeneralFeeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<DiscountRequest>,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    pub fee: FeeBreakdown,
    #[serde(default)]
    pub plan: PaymentPlan,
    /// Opaque to the store
    #[serde(default = "default_status")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

pub fn default_status() -> String {
    "active".to_string()
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub monthly_rate: Money,
    pub duration_months: i32,
    pub admission_open: bool,
}

#[derive(Debug, Clone)]
pub struct NewCourseFee {
    pub course_id: CourseId,
    pub monthly_rate: Money,
    pub fee_name: String,
}

#[derive(Debug, Clone)]
pub struct NewGeneralFee {
    pub fee_name: String,
    pub amount: Money,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub phone: Option<String>,
    pub guardian_name: Option<String>,
    pub course_id: CourseId,
    pub admission_date: NaiveDate,
    pub extra_fee_ids: Vec<GeneralFeeId>,
    pub discount: Option<DiscountRequest>,
    pub payment_mode: PaymentMode,
    pub fee: FeeBreakdown,
    pub plan: PaymentPlan,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub monthly_rate: Option<Money>,
    pub duration_months: Option<i32>,
    pub admission_open: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseFeePatch {
    pub monthly_rate: Option<Money>,
    pub fee_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GeneralFeePatch {
    pub fee_name: Option<String>,
    pub amount: Option<Money>,
}

/// Identity and status fields only; billing data is not patchable.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub guardian_name: Option<String>,
    pub status: Option<String>,
}

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::billing::FeeBreakdown;
use crate::error::Result;
use crate::money::Money;
use crate::validation;

/// Which installment absorbs the rounding difference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurplusPlacement {
    #[default]
    Last,
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Admissions after this day of the month start billing next month
    #[serde(default = "default_cutoff_day")]
    pub cutoff_day: u32,
    #[serde(default)]
    pub surplus: SurplusPlacement,
}

fn default_cutoff_day() -> u32 {
    20
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            cutoff_day: default_cutoff_day(),
            surplus: SurplusPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub index: u32,
    pub month: u32,
    pub year: i32,
    pub amount: Money,
}

impl Installment {
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{:02}/{}", self.month, self.year))
    }
}

/// An ordered month-by-month payment plan. Empty when nothing is left to
/// schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentPlan {
    pub installments: Vec<Installment>,
}

impl PaymentPlan {
    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn total(&self) -> Money {
        self.installments.iter().map(|i| i.amount).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Installment> {
        self.installments.iter()
    }
}

/// First billed (month, year) for an admission date.
pub fn start_period(admission_date: NaiveDate, cutoff_day: u32) -> (u32, i32) {
    let (month, year) = (admission_date.month(), admission_date.year());
    if admission_date.day() > cutoff_day {
        next_period(month, year)
    } else {
        (month, year)
    }
}

fn next_period(month: u32, year: i32) -> (u32, i32) {
    if month == 12 {
        (1, year + 1)
    } else {
        (month + 1, year)
    }
}

/// Split the unpaid course balance into `installment_count` monthly
/// installments starting from the admission period.
///
/// Returns an empty plan when the course portion is already fully paid.
pub fn build_plan(
    course_total: Money,
    amount_paid_toward_course: Money,
    installment_count: u32,
    admission_date: NaiveDate,
    settings: &ScheduleSettings,
) -> Result<PaymentPlan> {
    let count = validation::installment_count(installment_count)?;
    validation::non_negative("Course total", course_total)?;
    validation::non_negative("Amount paid toward course", amount_paid_toward_course)?;
    validation::cutoff_day(settings.cutoff_day)?;

    let remaining = course_total - amount_paid_toward_course;
    if !remaining.is_positive() {
        debug!(%course_total, "course portion fully paid, nothing to schedule");
        return Ok(PaymentPlan::default());
    }

    let amounts = split_amounts(remaining.minor(), i64::from(count), settings.surplus);
    let (mut month, mut year) = start_period(admission_date, settings.cutoff_day);

    let mut installments = Vec::with_capacity(amounts.len());
    for (i, amount) in amounts.into_iter().enumerate() {
        installments.push(Installment {
            index: i as u32 + 1,
            month,
            year,
            amount: Money::from_minor(amount),
        });
        (month, year) = next_period(month, year);
    }

    debug!(
        %remaining,
        count,
        start_month = installments[0].month,
        start_year = installments[0].year,
        "built installment plan"
    );

    Ok(PaymentPlan { installments })
}

/// Split `remaining` (minor units, > 0) into `count` parts summing exactly to it.
fn split_amounts(remaining: i64, count: i64, surplus: SurplusPlacement) -> Vec<i64> {
    match surplus {
        SurplusPlacement::Last => {
            let base = remaining / count + i64::from(remaining % count != 0);
            let mut running = 0;
            (0..count)
                .map(|i| {
                    let amount = if i == count - 1 {
                        remaining - running
                    } else {
                        base.min(remaining - running)
                    };
                    running += amount;
                    amount
                })
                .collect()
        }
        SurplusPlacement::First => {
            let base = remaining / count;
            let first = remaining - base * (count - 1);
            std::iter::once(first)
                .chain(std::iter::repeat(base).take(count as usize - 1))
                .collect()
        }
    }
}

/// Plan for a computed breakdown. A zero grand total (full discount) gets no
/// plan at all.
pub fn plan_for(
    breakdown: &FeeBreakdown,
    installment_count: u32,
    admission_date: NaiveDate,
    settings: &ScheduleSettings,
) -> Result<PaymentPlan> {
    if !breakdown.grand_total.is_positive() {
        validation::installment_count(installment_count)?;
        return Ok(PaymentPlan::default());
    }
    build_plan(
        breakdown.course_total,
        breakdown.amount_paid_toward_course(),
        installment_count,
        admission_date,
        settings,
    )
}

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::billing::{compute_breakdown, plan_for, DiscountRequest, FeeBreakdown, PaymentPlan, ScheduleSettings};
use crate::error::{Result, TuitionError};
use crate::money::Money;
use crate::store::{
    default_status, Course, CourseId, GeneralFee, GeneralFeeId, NewStudent, PaymentMode,
    RecordStore, StorageBackend, Student,
};

/// Raw values from the admission form.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub name: String,
    pub phone: Option<String>,
    pub guardian_name: Option<String>,
    pub course_id: CourseId,
    pub extra_fee_ids: Vec<GeneralFeeId>,
    pub discount: Option<DiscountRequest>,
    pub amount_paid: Money,
    /// `Some(n)` to pay the course portion in `n` monthly installments
    pub installments: Option<u32>,
    pub admission_date: NaiveDate,
    pub status: Option<String>,
}

/// Computed fees for an admission, before anything is stored.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub course: Course,
    pub extras: Vec<GeneralFee>,
    pub breakdown: FeeBreakdown,
    pub plan: PaymentPlan,
}

/// Work out the breakdown and plan for a request without saving anything.
pub fn quote<B: StorageBackend>(
    store: &RecordStore<B>,
    settings: &ScheduleSettings,
    request: &AdmissionRequest,
) -> Result<Quote> {
    let mut course = store
        .course(&request.course_id)
        .cloned()
        .ok_or_else(|| TuitionError::CourseNotFound(request.course_id.to_string()))?;

    // The fee record carries the rate actually charged
    if let Some(fee) = store.course_fee_for(&course.id) {
        course.monthly_rate = fee.monthly_rate;
    }

    let extras = request
        .extra_fee_ids
        .iter()
        .map(|id| {
            store
                .general_fee(id)
                .cloned()
                .ok_or_else(|| TuitionError::GeneralFeeNotFound(id.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let breakdown = compute_breakdown(
        &course,
        &extras,
        request.discount.as_ref(),
        request.amount_paid,
    )?;

    let plan = match request.installments {
        Some(count) => plan_for(&breakdown, count, request.admission_date, settings)?,
        None => PaymentPlan::default(),
    };

    Ok(Quote {
        course,
        extras,
        breakdown,
        plan,
    })
}

/// Validate, compute and persist a new student in one go. Nothing is written
/// when any check fails.
pub fn admit<B: StorageBackend>(
    store: &mut RecordStore<B>,
    settings: &ScheduleSettings,
    request: AdmissionRequest,
) -> Result<Student> {
    let quote = quote(store, settings, &request)?;
    if !quote.course.admission_open {
        return Err(TuitionError::AdmissionClosed(quote.course.id.to_string()));
    }

    let payment_mode = if request.installments.is_some() {
        PaymentMode::Installments
    } else {
        PaymentMode::Full
    };

    let student = store.add_student(NewStudent {
        name: request.name,
        phone: request.phone,
        guardian_name: request.guardian_name,
        course_id: request.course_id,
        admission_date: request.admission_date,
        extra_fee_ids: request.extra_fee_ids,
        discount: request.discount,
        payment_mode,
        fee: quote.breakdown,
        plan: quote.plan,
        status: request.status.unwrap_or_else(default_status),
    })?;

    info!(
        id = %student.id,
        total = %student.fee.grand_total,
        installments = student.plan.len(),
        "admission complete"
    );
    Ok(student)
}

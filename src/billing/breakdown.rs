use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::error::{InputError, Result};
use crate::money::Money;
use crate::store::{Course, GeneralFee};
use crate::validation;

/// A discount typed in at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DiscountRequest {
    Fixed(Money),
    Percentage(f64),
}

impl DiscountRequest {
    /// Resolve against the pre-discount total. The result always lies in
    /// `[0, pre_discount]`.
    pub fn resolve(&self, pre_discount: Money) -> Result<Money> {
        let amount = match *self {
            DiscountRequest::Fixed(value) => value.clamp(Money::ZERO, pre_discount),
            DiscountRequest::Percentage(pct) => {
                if !pct.is_finite() {
                    return Err(InputError::InvalidPercentage(pct.to_string()).into());
                }
                pre_discount
                    .percent(pct.clamp(0.0, 100.0))
                    .clamp(Money::ZERO, pre_discount)
            }
        };
        Ok(amount)
    }
}

impl FromStr for DiscountRequest {
    type Err = InputError;

    /// Parse "2000" as a fixed amount and "10%" as a percentage
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let value: f64 = pct
                .trim()
                .parse()
                .map_err(|_| InputError::InvalidPercentage(s.to_string()))?;
            if !value.is_finite() {
                return Err(InputError::InvalidPercentage(s.to_string()));
            }
            return Ok(DiscountRequest::Percentage(value));
        }

        s.parse::<Money>()
            .map(DiscountRequest::Fixed)
            .map_err(|_| InputError::InvalidDiscount(s.to_string()))
    }
}

/// Totals derived for one admission. Not persisted on its own; it is
/// snapshotted into the student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub course_total: Money,
    pub extras_total: Money,
    pub discount_amount: Money,
    pub grand_total: Money,
    pub amount_paid: Money,
    pub amount_due: Money,
}

impl FeeBreakdown {
    /// Recompute the paid/due summary after a later payment. Out-of-range
    /// values are clamped into `[0, grand_total]` rather than rejected.
    pub fn with_amount_paid(&self, paid: Money) -> FeeBreakdown {
        let amount_paid = paid.clamp(Money::ZERO, self.grand_total);
        FeeBreakdown {
            amount_paid,
            amount_due: self.grand_total - amount_paid,
            ..*self
        }
    }

    /// The share of the payment counted against the course balance. Extra
    /// fees are settled separately and never reduce it.
    pub fn amount_paid_toward_course(&self) -> Money {
        self.amount_paid.min(self.course_total)
    }

    pub fn pre_discount(&self) -> Money {
        self.course_total.saturating_add(self.extras_total)
    }
}

/// Compute the totals for a new admission.
///
/// Rejects a negative or oversized `amount_paid`; use
/// [`FeeBreakdown::with_amount_paid`] when recomputing a stored record.
pub fn compute_breakdown(
    course: &Course,
    extras: &[GeneralFee],
    discount: Option<&DiscountRequest>,
    amount_paid: Money,
) -> Result<FeeBreakdown> {
    validation::non_negative("Amount paid", amount_paid)?;
    validation::positive_duration(course.duration_months)?;
    validation::non_negative("Monthly rate", course.monthly_rate)?;
    for extra in extras {
        validation::non_negative("Extra fee amount", extra.amount)?;
    }

    let course_total = validation::course_total(course.monthly_rate, course.duration_months)?;
    let extras_total = Money::checked_sum(extras.iter().map(|e| e.amount))
        .ok_or(InputError::AmountOverflow("Extra fees total"))?;
    let pre_discount = course_total
        .checked_add(extras_total)
        .ok_or(InputError::AmountOverflow("Pre-discount total"))?;

    let discount_amount = match discount {
        Some(request) => request.resolve(pre_discount)?,
        None => Money::ZERO,
    };
    let grand_total = pre_discount - discount_amount;

    let amount_paid = validation::amount_paid_within(amount_paid, grand_total)?;

    debug!(
        course = %course.id,
        %course_total,
        %extras_total,
        %discount_amount,
        %grand_total,
        "computed fee breakdown"
    );

    Ok(FeeBreakdown {
        course_total,
        extras_total,
        discount_amount,
        grand_total,
        amount_paid,
        amount_due: grand_total - amount_paid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TuitionError;
    use crate::store::{CourseId, GeneralFeeId};
    use chrono::Utc;

    fn course(rate: i64, months: i32) -> Course {
        Course {
            id: CourseId::new("course_1"),
            title: "Spoken English".to_string(),
            monthly_rate: Money::from_major(rate),
            duration_months: months,
            admission_open: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn extra(amount: i64) -> GeneralFee {
        GeneralFee {
            id: GeneralFeeId::new("fee_1"),
            fee_name: "Admission".to_string(),
            amount: Money::from_major(amount),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn fixed_discount_with_one_extra() {
        let fee = compute_breakdown(
            &course(3000, 3),
            &[extra(1000)],
            Some(&DiscountRequest::Fixed(Money::from_major(2000))),
            Money::ZERO,
        )
        .unwrap();

        assert_eq!(fee.course_total, Money::from_major(9000));
        assert_eq!(fee.extras_total, Money::from_major(1000));
        assert_eq!(fee.discount_amount, Money::from_major(2000));
        assert_eq!(fee.grand_total, Money::from_major(8000));
        assert_eq!(fee.amount_due, Money::from_major(8000));
    }

    #[test]
    fn percentage_discount_is_clamped_to_one_hundred() {
        let fee = compute_breakdown(
            &course(1000, 2),
            &[],
            Some(&DiscountRequest::Percentage(150.0)),
            Money::ZERO,
        )
        .unwrap();

        assert_eq!(fee.discount_amount, Money::from_major(2000));
        assert_eq!(fee.grand_total, Money::ZERO);
        assert_eq!(fee.amount_due, Money::ZERO);
    }

    #[test]
    fn negative_percentage_means_no_discount() {
        let fee = compute_breakdown(
            &course(1000, 2),
            &[],
            Some(&DiscountRequest::Percentage(-20.0)),
            Money::ZERO,
        )
        .unwrap();
        assert_eq!(fee.discount_amount, Money::ZERO);
    }

    #[test]
    fn fixed_discount_never_exceeds_pre_discount_total() {
        let fee = compute_breakdown(
            &course(100, 1),
            &[extra(50)],
            Some(&DiscountRequest::Fixed(Money::from_major(10_000))),
            Money::ZERO,
        )
        .unwrap();
        assert_eq!(fee.discount_amount, Money::from_major(150));
        assert_eq!(fee.grand_total, Money::ZERO);
    }

    #[test]
    fn grand_total_identity_holds_across_discounts() {
        let discounts = [
            None,
            Some(DiscountRequest::Fixed(Money::from_major(0))),
            Some(DiscountRequest::Fixed(Money::from_minor(333))),
            Some(DiscountRequest::Percentage(33.3)),
            Some(DiscountRequest::Percentage(100.0)),
        ];
        for rate in [0, 1, 999, 2500] {
            for months in [1, 3, 12] {
                for discount in &discounts {
                    let fee = compute_breakdown(
                        &course(rate, months),
                        &[extra(10), extra(7)],
                        discount.as_ref(),
                        Money::ZERO,
                    )
                    .unwrap();
                    assert_eq!(
                        fee.grand_total,
                        fee.course_total + fee.extras_total - fee.discount_amount
                    );
                    assert!(!fee.grand_total.is_negative());
                    assert!(fee.discount_amount <= fee.pre_discount());
                }
            }
        }
    }

    #[test]
    fn rejects_invalid_course_and_payment() {
        let err = compute_breakdown(&course(100, 0), &[], None, Money::ZERO).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(InputError::NonPositiveDuration(0))
        ));

        let err = compute_breakdown(&course(-1, 3), &[], None, Money::ZERO).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(InputError::NegativeAmount { .. })
        ));

        let err =
            compute_breakdown(&course(100, 3), &[], None, Money::from_major(-5)).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(InputError::NegativeAmount { .. })
        ));

        let err =
            compute_breakdown(&course(100, 3), &[], None, Money::from_major(301)).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(InputError::AmountPaidExceedsTotal { .. })
        ));
    }

    #[test]
    fn oversized_totals_are_rejected_not_wrapped() {
        let mut big = course(0, 12);
        big.monthly_rate = "50000000000000000".parse().unwrap();
        let err = compute_breakdown(&big, &[], None, Money::ZERO).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(InputError::AmountOverflow(_))
        ));

        let mut huge_extra = extra(0);
        huge_extra.amount = Money::from_minor(i64::MAX);
        let extras = [huge_extra.clone(), huge_extra];
        let err = compute_breakdown(&course(100, 1), &extras, None, Money::ZERO).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(InputError::AmountOverflow(_))
        ));
    }

    #[test]
    fn recomputation_clamps_instead_of_failing() {
        let fee = compute_breakdown(&course(100, 3), &[], None, Money::ZERO).unwrap();

        let over = fee.with_amount_paid(Money::from_major(1000));
        assert_eq!(over.amount_paid, Money::from_major(300));
        assert_eq!(over.amount_due, Money::ZERO);

        let under = fee.with_amount_paid(Money::from_major(-10));
        assert_eq!(under.amount_paid, Money::ZERO);
        assert_eq!(under.amount_due, Money::from_major(300));
    }

    #[test]
    fn payment_toward_course_excludes_extras() {
        let fee = compute_breakdown(&course(100, 3), &[extra(200)], None, Money::from_major(450))
            .unwrap();
        assert_eq!(fee.amount_paid_toward_course(), Money::from_major(300));
    }

    #[test]
    fn parses_discount_text() {
        assert_eq!(
            "2000".parse::<DiscountRequest>().unwrap(),
            DiscountRequest::Fixed(Money::from_major(2000))
        );
        assert_eq!(
            "12.5%".parse::<DiscountRequest>().unwrap(),
            DiscountRequest::Percentage(12.5)
        );
        assert!("ten".parse::<DiscountRequest>().is_err());
        assert!("x%".parse::<DiscountRequest>().is_err());
    }

    #[test]
    fn discount_serializes_with_kind_and_value() {
        let json = serde_json::to_string(&DiscountRequest::Percentage(10.0)).unwrap();
        assert_eq!(json, r#"{"kind":"percentage","value":10.0}"#);
    }
}

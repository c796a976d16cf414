//! Input guards shared by the billing functions and the record store.

use crate::error::InputError;
use crate::money::Money;

pub const MIN_INSTALLMENTS: u32 = 2;
pub const MAX_INSTALLMENTS: u32 = 12;

pub fn non_negative(field: &'static str, amount: Money) -> Result<Money, InputError> {
    if amount.is_negative() {
        return Err(InputError::NegativeAmount { field, amount });
    }
    Ok(amount)
}

pub fn positive_duration(months: i32) -> Result<i32, InputError> {
    if months <= 0 {
        return Err(InputError::NonPositiveDuration(months));
    }
    Ok(months)
}

/// `monthly_rate * months`, refusing totals that do not fit in `Money`.
pub fn course_total(monthly_rate: Money, months: i32) -> Result<Money, InputError> {
    monthly_rate
        .checked_mul(i64::from(months))
        .ok_or(InputError::AmountOverflow("Course total"))
}

pub fn installment_count(count: u32) -> Result<u32, InputError> {
    if !(MIN_INSTALLMENTS..=MAX_INSTALLMENTS).contains(&count) {
        return Err(InputError::InstallmentCount(count));
    }
    Ok(count)
}

/// Submission-time check: the payment must fit inside the total.
pub fn amount_paid_within(paid: Money, total: Money) -> Result<Money, InputError> {
    non_negative("Amount paid", paid)?;
    if paid > total {
        return Err(InputError::AmountPaidExceedsTotal { paid, total });
    }
    Ok(paid)
}

pub fn positive_payment(amount: Money) -> Result<Money, InputError> {
    if !amount.is_positive() {
        return Err(InputError::NonPositivePayment);
    }
    Ok(amount)
}

pub fn cutoff_day(day: u32) -> Result<u32, InputError> {
    if !(1..=31).contains(&day) {
        return Err(InputError::InvalidCutoffDay(day));
    }
    Ok(day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installment_bounds_are_inclusive() {
        assert!(installment_count(1).is_err());
        assert_eq!(installment_count(2), Ok(2));
        assert_eq!(installment_count(12), Ok(12));
        assert_eq!(installment_count(13), Err(InputError::InstallmentCount(13)));
    }

    #[test]
    fn amount_paid_rejects_out_of_range() {
        let total = Money::from_major(100);
        assert!(amount_paid_within(Money::from_major(-1), total).is_err());
        assert!(amount_paid_within(Money::from_major(101), total).is_err());
        assert_eq!(amount_paid_within(total, total), Ok(total));
    }

    #[test]
    fn course_total_refuses_overflow() {
        let rate: Money = "50000000000000000".parse().unwrap();
        assert_eq!(
            course_total(rate, 12),
            Err(InputError::AmountOverflow("Course total"))
        );
        assert_eq!(
            course_total(Money::from_major(3000), 3),
            Ok(Money::from_major(9000))
        );
    }

    #[test]
    fn duration_must_be_positive() {
        assert_eq!(positive_duration(0), Err(InputError::NonPositiveDuration(0)));
        assert_eq!(positive_duration(6), Ok(6));
    }
}

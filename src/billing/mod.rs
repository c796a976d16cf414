mod breakdown;
mod schedule;

pub use breakdown::{compute_breakdown, DiscountRequest, FeeBreakdown};
pub use schedule::{
    build_plan, plan_for, start_period, Installment, PaymentPlan, ScheduleSettings,
    SurplusPlacement,
};

pub mod admission;
pub mod billing;
pub mod config;
pub mod error;
pub mod money;
pub mod store;
pub mod validation;

pub use admission::{admit, quote, AdmissionRequest, Quote};
pub use billing::{
    build_plan, compute_breakdown, DiscountRequest, FeeBreakdown, Installment, PaymentPlan,
    ScheduleSettings, SurplusPlacement,
};
pub use config::{Config, Institute};
pub use error::{InputError, Result, TuitionError};
pub use money::Money;
pub use store::{RecordStore, Snapshot, StoreStats};

//! Context and token accounting
//!
//! [`ContextAccountant`] keeps each session's token stats current, computes
//! usage against the effective budget and flags sessions for compaction.
//! [`UsageLedger`] is the day-keyed usage history shown to the user.

mod accountant;
mod ledger;

pub use accountant::{
    AccountantConfig, CompactionState, ContextAccountant, ContextReport, usage_percentage,
};
pub use ledger::{DailyUsage, UsageLedger};

//! Day-keyed usage history

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Tokens recorded for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    /// Input tokens
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
}

impl DailyUsage {
    /// Input plus output
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Usage history persisted under `usageHistory`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageLedger {
    days: BTreeMap<NaiveDate, DailyUsage>,
}

impl UsageLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tokens to a day
    pub fn record(&mut self, date: NaiveDate, input_tokens: u64, output_tokens: u64) {
        if input_tokens == 0 && output_tokens == 0 {
            return;
        }
        let day = self.days.entry(date).or_default();
        day.input_tokens = day.input_tokens.saturating_add(input_tokens);
        day.output_tokens = day.output_tokens.saturating_add(output_tokens);
    }

    /// Usage recorded for a day, zero if none
    #[must_use]
    pub fn total_for(&self, date: NaiveDate) -> DailyUsage {
        self.days.get(&date).copied().unwrap_or_default()
    }

    /// Days with usage in the `days`-day window ending at `today`, oldest first
    #[must_use]
    pub fn recent(&self, today: NaiveDate, days: u64) -> Vec<(NaiveDate, DailyUsage)> {
        let Some(start) = today.checked_sub_days(Days::new(days.saturating_sub(1))) else {
            return Vec::new();
        };
        self.days
            .range(start..=today)
            .map(|(date, usage)| (*date, *usage))
            .collect()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

//! Per-session context accounting and the auto-compaction flag

use std::collections::HashMap;

use chrono::NaiveDate;

use super::ledger::UsageLedger;
use crate::events::UsageSnapshot;
use crate::types::identifiers::SessionId;
use crate::types::options::AgentSettings;
use crate::types::session::TokenStats;

/// Compaction state of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompactionState {
    /// Below the threshold, or already compacted
    #[default]
    Normal,
    /// Threshold crossed; compaction runs when the current turn completes
    PendingCompaction,
}

/// Budget parameters taken from the settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountantConfig {
    /// Token budget the percentage is computed against
    pub effective_limit: u64,
    /// Percentage at which compaction is flagged
    pub threshold_percent: f64,
    /// Whether crossing the threshold flags anything at all
    pub auto_compact: bool,
}

impl AccountantConfig {
    /// Extract the accounting parameters from the settings
    #[must_use]
    pub const fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            effective_limit: settings.effective_context_limit,
            threshold_percent: settings.auto_compact_threshold_percent,
            auto_compact: settings.auto_compact,
        }
    }
}

impl Default for AccountantConfig {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

/// Outcome of applying one usage report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextReport {
    /// Input plus output tokens
    pub used: u64,
    /// Effective limit the percentage is computed against
    pub limit: u64,
    /// Usage percentage, clamped to 100
    pub percentage: f64,
    /// Whether this report moved the session into `PendingCompaction`
    pub flagged: bool,
}

/// Usage percentage of `used` against `limit`, clamped to 100
#[must_use]
pub fn usage_percentage(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 100.0;
    }
    // Multiply before dividing so round budgets give exact percentages
    (used as f64 * 100.0 / limit as f64).min(100.0)
}

/// Token accountant for every session
///
/// Usage counters from the agent are cumulative, so each report replaces the
/// session's stats instead of adding to them. The daily ledger only advances
/// for the session that is in the foreground when the report arrives.
#[derive(Debug, Default)]
pub struct ContextAccountant {
    config: AccountantConfig,
    states: HashMap<SessionId, CompactionState>,
    ledger: UsageLedger,
}

impl ContextAccountant {
    /// Create an accountant seeded with a persisted ledger
    #[must_use]
    pub fn new(config: AccountantConfig, ledger: UsageLedger) -> Self {
        Self {
            config,
            states: HashMap::new(),
            ledger,
        }
    }

    /// Current parameters
    #[must_use]
    pub const fn config(&self) -> AccountantConfig {
        self.config
    }

    /// Replace the parameters; existing flags are kept
    pub fn set_config(&mut self, config: AccountantConfig) {
        self.config = config;
    }

    /// Daily usage history
    #[must_use]
    pub const fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Apply a cumulative usage report to a session's stats
    pub fn apply_usage(
        &mut self,
        session_id: &SessionId,
        stats: &mut Option<TokenStats>,
        usage: &UsageSnapshot,
        foreground: bool,
        today: NaiveDate,
    ) -> ContextReport {
        let current = stats.get_or_insert_with(TokenStats::default);

        if foreground {
            let input_delta = usage.input_tokens.saturating_sub(current.input_tokens);
            let output_delta = usage.output_tokens.saturating_sub(current.output_tokens);
            self.ledger.record(today, input_delta, output_delta);
        }

        current.input_tokens = usage.input_tokens;
        current.output_tokens = usage.output_tokens;
        current.cache_read_tokens = usage.cache_read_tokens;
        current.context_window = usage.context_window;

        let used = current.used_tokens();
        let limit = self.config.effective_limit;
        let percentage = usage_percentage(used, limit);

        let state = self.states.entry(session_id.clone()).or_default();
        let flagged = self.config.auto_compact
            && *state == CompactionState::Normal
            && percentage >= self.config.threshold_percent;
        if flagged {
            log::info!(
                "[{session_id}] Context at {percentage:.1}% ({used}/{limit}), compaction pending"
            );
            *state = CompactionState::PendingCompaction;
        } else {
            log::debug!("[{session_id}] Context at {percentage:.1}% ({used}/{limit})");
        }

        ContextReport {
            used,
            limit,
            percentage,
            flagged,
        }
    }

    /// Compaction state of a session
    #[must_use]
    pub fn state(&self, session_id: &SessionId) -> CompactionState {
        self.states.get(session_id).copied().unwrap_or_default()
    }

    /// Whether a compaction is flagged for the session
    #[must_use]
    pub fn is_pending(&self, session_id: &SessionId) -> bool {
        self.state(session_id) == CompactionState::PendingCompaction
    }

    /// Return the session to `Normal` after a compaction finished or was given up
    pub fn on_compacted(&mut self, session_id: &SessionId) {
        self.states.remove(session_id);
    }

    /// Drop all state for a deleted session
    pub fn forget(&mut self, session_id: &SessionId) {
        self.states.remove(session_id);
    }
}

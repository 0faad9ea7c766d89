//! Detection of provider usage-limit failures in result text

use chrono::DateTime;

/// Markers accepted when the result is flagged as an error
const ERROR_MARKERS: &[&str] = &["usage limit", "limit reached", "rate limit", "rate_limit"];

/// Prefixes accepted even when the result is not flagged as an error
const STRICT_PREFIXES: &[&str] = &["claude ai usage limit reached"];

/// A usage-limit failure reported by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitNotice {
    /// When the limit resets, RFC 3339 when the agent sent an epoch
    pub reset_time: Option<String>,
    /// Message suitable for display
    pub message: String,
}

/// Check result text for a usage-limit marker
///
/// Error results match any known marker. Successful results only match the
/// CLI's literal limit banner so ordinary answers that mention rate limits
/// are left alone.
#[must_use]
pub fn detect_rate_limit(text: &str, is_error: bool) -> Option<RateLimitNotice> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    let matched = if is_error {
        ERROR_MARKERS.iter().any(|m| lower.contains(m))
    } else {
        STRICT_PREFIXES.iter().any(|p| lower.starts_with(p))
    };
    if !matched {
        return None;
    }

    // Only a numeric tail after the last pipe is an epoch suffix
    let epoch_suffix = text
        .rsplit_once('|')
        .and_then(|(head, tail)| Some((head, parse_epoch(tail.trim())?)));
    let (message, reset_time) = match epoch_suffix {
        Some((head, reset)) => (head.trim().to_string(), Some(reset)),
        None => (text.trim().to_string(), parse_reset_phrase(text)),
    };

    Some(RateLimitNotice {
        reset_time,
        message,
    })
}

fn parse_epoch(raw: &str) -> Option<String> {
    let secs: i64 = raw.parse().ok()?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339())
}

fn parse_reset_phrase(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let idx = lower.find("resets")?;
    // Byte offsets agree because the marker is ASCII
    let rest = text
        .get(idx + "resets".len()..)?
        .trim_start_matches([' ', ':'].as_slice());
    let hint = rest
        .strip_prefix("at ")
        .unwrap_or(rest)
        .trim()
        .trim_end_matches('.')
        .trim();
    (!hint.is_empty()).then(|| hint.to_string())
}

//! Unit tests for usage-limit detection

use vault_chat_agent::protocol::detect_rate_limit;

#[test]
fn test_error_result_with_marker() {
    let notice = detect_rate_limit("5-hour limit reached, resets at 3pm", true).unwrap();
    assert_eq!(notice.message, "5-hour limit reached, resets at 3pm");
    assert_eq!(notice.reset_time.as_deref(), Some("3pm"));
}

#[test]
fn test_epoch_suffix_becomes_rfc3339() {
    let notice = detect_rate_limit("Claude AI usage limit reached|0", true).unwrap();
    assert_eq!(notice.message, "Claude AI usage limit reached");
    assert_eq!(notice.reset_time.as_deref(), Some("1970-01-01T00:00:00+00:00"));
}

#[test]
fn test_unparseable_epoch_has_no_reset_time() {
    let notice = detect_rate_limit("usage limit reached|soon", true).unwrap();
    assert_eq!(notice.reset_time, None);
}

#[test]
fn test_pipe_without_epoch_keeps_message() {
    let notice = detect_rate_limit("rate limit: a|b", true).unwrap();
    assert_eq!(notice.message, "rate limit: a|b");
    assert_eq!(notice.reset_time, None);

    let notice = detect_rate_limit("rate limit hit | resets at 5pm", true).unwrap();
    assert_eq!(notice.message, "rate limit hit | resets at 5pm");
    assert_eq!(notice.reset_time.as_deref(), Some("5pm"));
}

#[test]
fn test_success_result_needs_banner() {
    assert!(detect_rate_limit("Rate limits are discussed in chapter 3.", false).is_none());
    assert!(detect_rate_limit("Claude AI usage limit reached|1700000000", false).is_some());
}

#[test]
fn test_error_without_marker() {
    assert!(detect_rate_limit("Tool execution failed", true).is_none());
    assert!(detect_rate_limit("", true).is_none());
}

#[test]
fn test_marker_is_case_insensitive() {
    assert!(detect_rate_limit("RATE_LIMIT exceeded", true).is_some());
}

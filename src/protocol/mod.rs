//! Agent output protocol
//!
//! The agent CLI writes one JSON record per line. [`ProtocolDecoder`] turns
//! raw output chunks into typed events; [`rate_limit`] recognises the
//! provider's usage-limit failures inside result text.

mod decoder;
pub mod rate_limit;

pub use decoder::{
    DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_LINE_BYTES, PendingMessage, ProtocolDecoder, decode_line,
    translate_record,
};
pub use rate_limit::{RateLimitNotice, detect_rate_limit};

/// Application name
pub const APP_NAME: &str = "Palaver";

/// Default base URL of the request/response API
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001/api";

/// Delay between displaying an inbound message and acknowledging it as read
pub const READ_ACK_DELAY_MS: u64 = 2_000;

/// Inactivity after which a typing indicator is considered stale
pub const TYPING_EXPIRY_MS: u64 = 5_000;

/// Automatic resend attempts before a failed message waits for a manual retry
pub const MAX_SEND_ATTEMPTS: u32 = 5;

/// Exponential backoff bounds shared by resends and channel reconnects
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// HTTP request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Maximum number of characters kept in a conversation preview
pub const PREVIEW_MAX_CHARS: usize = 60;

/// Capacity of the channel adapter's command and notification queues
pub const CHANNEL_QUEUE_CAPACITY: usize = 256;

/// Number of deleted message ids remembered so late echoes stay dropped
pub const DELETED_IDS_REMEMBERED: usize = 512;

/// Status text used until the user picks one
pub const DEFAULT_STATUS_TEXT: &str = "Available";

/// Compute the backoff delay for the given attempt number (0-based).
pub fn backoff_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        assert_eq!(backoff_delay_ms(0, 1_000, 30_000), 1_000);
        assert_eq!(backoff_delay_ms(1, 1_000, 30_000), 2_000);
        assert_eq!(backoff_delay_ms(4, 1_000, 30_000), 16_000);
        assert_eq!(backoff_delay_ms(5, 1_000, 30_000), 30_000);
        assert_eq!(backoff_delay_ms(200, 1_000, 30_000), 30_000);
    }
}

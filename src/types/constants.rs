use std::time::Duration;

/// Name of the first event the server sends on a fresh realtime stream.
pub const PB_CONNECT: &str = "PB_CONNECT";

/// Path of the realtime endpoint (GET opens the stream, POST sets subscriptions)
pub const REALTIME_PATH: &str = "/api/realtime";

/// Prefix of the cancel key used for subscription submissions
pub const CANCEL_KEY_PREFIX: &str = "realtime_";

/// Marker placed before the encoded options inside a subscription key
pub const OPTIONS_MARKER: &str = "options=";

/// Default maximum time to wait for a connection (milliseconds)
pub const DEFAULT_MAX_CONNECT_TIMEOUT: u64 = 15_000;

/// Default time to wait for the stream reader to stop on disconnect (milliseconds)
pub const DEFAULT_READER_JOIN_TIMEOUT: u64 = 1_000;

/// Longest unterminated SSE line buffered before the stream is failed (bytes)
pub const DEFAULT_MAX_SSE_LINE_LENGTH: usize = 4 * 1024 * 1024;

/// Reconnect intervals (milliseconds), indexed by attempt and clamped to the last entry
pub const RECONNECT_INTERVALS: [u64; 7] = [200, 300, 500, 1000, 1200, 1500, 2000];
pub const DEFAULT_RECONNECT_FALLBACK: u64 = 2000;

/// Extra submissions attempted after connect while the registry keeps changing
pub const MAX_RESUBMIT_RETRIES: usize = 3;

/// Builds the cancel key for subscription submissions of a connection.
pub fn subscriptions_cancel_key(client_id: &str) -> String {
    format!("{}{}", CANCEL_KEY_PREFIX, client_id)
}

pub fn default_reconnect_intervals() -> Vec<Duration> {
    RECONNECT_INTERVALS
        .iter()
        .map(|ms| Duration::from_millis(*ms))
        .collect()
}

use thiserror::Error;

/// Errors that can occur when using the PocketBase realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Invalid argument passed to a public operation (e.g. an empty topic)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The event stream could not be opened or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connection attempt exceeded the configured connect timeout
    #[error("Timeout error")]
    Timeout,

    /// The request was aborted through its cancel key
    #[error("Request cancelled")]
    RequestCancelled,

    /// A subscription listener failed while handling an event
    #[error("Callback error: {0}")]
    Callback(String),

    /// The server answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed base URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl RealtimeError {
    /// Whether this error reports a request aborted through its cancel key.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::RequestCancelled)
    }

    /// Copy of this error suitable for handing to every pending connect waiter.
    ///
    /// Wrapped library errors are not `Clone`, so they collapse into
    /// [`RealtimeError::Connection`] with the original message.
    pub(crate) fn for_waiter(&self) -> Self {
        match self {
            Self::Timeout => Self::Timeout,
            Self::RequestCancelled => Self::RequestCancelled,
            Self::InvalidArgument(msg) => Self::InvalidArgument(msg.clone()),
            Self::Connection(msg) => Self::Connection(msg.clone()),
            Self::Status { status, body } => Self::Status {
                status: *status,
                body: body.clone(),
            },
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;

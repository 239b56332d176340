use crate::types::constants::PB_CONNECT;
use crate::types::parse_message;
use serde_json::Value;

/// One decoded server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `id:` field (the client id for `PB_CONNECT`)
    pub id: Option<String>,
    /// Value of the `event:` field, `message` when absent
    pub event: String,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: event.into(),
            data: data.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether this is the handshake event opening a stream.
    pub fn is_connect(&self) -> bool {
        self.event == PB_CONNECT
    }

    /// Decoded data, `{}` when empty or malformed.
    pub fn payload(&self) -> Value {
        parse_message(Some(&self.data))
    }

    /// Client id announced by a `PB_CONNECT` event.
    ///
    /// Taken from the event id, falling back to `clientId` in the payload.
    pub fn client_id(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref()
            && !id.is_empty()
        {
            return Some(id.to_string());
        }

        self.payload()
            .get("clientId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

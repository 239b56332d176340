use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of the subscription submission request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionsRequest {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub subscriptions: Vec<String>,
}

impl SubscriptionsRequest {
    pub fn new(client_id: impl Into<String>, subscriptions: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            subscriptions,
        }
    }
}

/// Parses the data of an inbound frame.
///
/// Missing, empty or malformed data yields an empty object so that heartbeat
/// frames never break the dispatch loop.
pub fn parse_message(raw: Option<&str>) -> Value {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return Value::Object(Default::default());
    };

    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::debug!("Ignoring undecodable frame data: {}", e);
        Value::Object(Default::default())
    })
}

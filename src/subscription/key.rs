use crate::types::{OPTIONS_MARKER, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Extra parameters sent along with a subscription.
///
/// The server reads them back from the subscription key, so they are
/// serialized deterministically: map keys are kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionOptions {
    /// Additional query parameters (e.g. `filter`, `expand`, `fields`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, Value>>,
    /// Additional request headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl SubscriptionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_none() && self.headers.is_none()
    }
}

/// Builds the registry key for a topic and its options.
///
/// Without options (or with empty ones) the key is the topic itself. Otherwise
/// `options=<percent-encoded json>` is appended, separated by `?`, or by `&`
/// when the topic already carries a query part.
pub fn encode_key(topic: &str, options: Option<&SubscriptionOptions>) -> Result<String> {
    let Some(options) = options.filter(|options| !options.is_empty()) else {
        return Ok(topic.to_string());
    };

    let json = serde_json::to_string(options)?;
    let separator = if topic.contains('?') { '&' } else { '?' };

    Ok(format!(
        "{}{}{}{}",
        topic,
        separator,
        OPTIONS_MARKER,
        percent_encode(&json)
    ))
}

/// Percent-encodes a component, spaces included (`%20`, never `+`).
fn percent_encode(input: &str) -> String {
    // byte_serialize escapes a literal '+' as %2B, so every remaining '+' is a space
    form_urlencoded::byte_serialize(input.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Whether `key` belongs to `topic`.
///
/// `?` acts as the end delimiter of a topic: `posts` matches `posts` and
/// `posts?options=...` but not `posts/123`. A topic that already contains `?`
/// is compared as-is.
pub fn key_matches_topic(key: &str, topic: &str) -> bool {
    if topic.contains('?') {
        delimited_starts_with(key, topic)
    } else {
        delimited_starts_with(key, &format!("{}?", topic))
    }
}

/// Whether `key` starts with `prefix`, treating `?` as the end of the key.
///
/// `posts` removes `posts`, `posts/123` and `posts?options=...`.
pub fn key_matches_prefix(key: &str, prefix: &str) -> bool {
    delimited_starts_with(key, prefix)
}

/// Equivalent of `(key + "?").starts_with(prefix)` without the allocation.
fn delimited_starts_with(key: &str, prefix: &str) -> bool {
    match prefix.strip_prefix(key) {
        Some(rest) => rest.is_empty() || rest == "?",
        None => key.starts_with(prefix),
    }
}

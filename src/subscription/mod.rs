// Module declarations
mod key;
mod listener;
mod registry;

// Public API exports
pub use key::{SubscriptionOptions, encode_key, key_matches_prefix, key_matches_topic};
pub use listener::{BoxError, Listener};
pub use registry::{SubscriptionEntry, SubscriptionRegistry};

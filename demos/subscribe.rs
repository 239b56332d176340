use pocketbase_realtime_rs::{
    Listener, MemoryTokenStore, RealtimeClient, RealtimeClientOptions, SubscriptionOptions,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base_url =
        std::env::var("POCKETBASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8090".to_string());
    let collection = std::env::var("POCKETBASE_COLLECTION").unwrap_or_else(|_| "posts".to_string());

    let tokens = Arc::new(MemoryTokenStore::new());
    if let Ok(token) = std::env::var("POCKETBASE_TOKEN") {
        tokens.save(token);
    }

    let client = RealtimeClient::builder(
        base_url.as_str(),
        RealtimeClientOptions::default(),
    )?
    .with_token_provider(tokens)
    .on_disconnect(|keys| println!("Disconnected, active subscriptions: {keys:?}"))
    .build()?;

    println!("Subscribing to '{}' on {}...", collection, base_url);
    let handle = client
        .subscribe(
            &collection,
            Listener::new(|event| println!("📨 {event}")),
            Some(SubscriptionOptions::new().with_query("expand", "author")),
        )
        .await?;
    println!("Subscribed as client {}", client.client_id().await);

    // Keep listening until Ctrl+C
    tokio::signal::ctrl_c().await?;

    println!("Unsubscribing...");
    handle.unsubscribe().await?;
    println!("Done!");

    Ok(())
}

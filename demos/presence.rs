//! Sets a playing status once the session is ready.
//!
//! Usage: DISCORD_TOKEN=... cargo run --example presence

use anyhow::Context;
use discord_gateway::client::Client;
use discord_gateway::protocol::{Intents, PresenceUpdate};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let token = std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?;
    let mut client = Client::new(format!("Bot {token}"), Intents::none());
    let handle = client.handle();

    client.on_dispatch(move |event| {
        let handle = handle.clone();
        async move {
            if event.name == "READY" {
                info!("ready; setting presence");
                handle
                    .set_presence(PresenceUpdate::playing("with the gateway"), true)
                    .await?;
            }
            Ok(())
        }
    });

    client.run().await?;
    Ok(())
}

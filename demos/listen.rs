//! Connects to the gateway and logs every dispatched event.
//!
//! Usage: DISCORD_TOKEN=... cargo run --example listen

use anyhow::Context;
use discord_gateway::client::Client;
use discord_gateway::protocol::Intents;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let token = std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?;
    let mut client = Client::new(format!("Bot {token}"), Intents::standard());

    client.on_dispatch(|event| async move {
        info!(name = %event.name, seq = event.seq, "event");
        Ok(())
    });

    client.run().await?;
    Ok(())
}

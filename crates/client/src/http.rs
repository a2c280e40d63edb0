//! The one REST call the client makes: fetching the gateway URL

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ClientError;

const API_BASE: &str = "https://discord.com/api/v10";

const USER_AGENT: &str = concat!(
    "DiscordBot (https://crates.io/crates/discord-gateway, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[derive(Debug, Deserialize)]
struct GetGatewayBot {
    url: String,
    shards: u32,
    session_start_limit: SessionStartLimit,
}

#[derive(Debug, Deserialize)]
struct SessionStartLimit {
    total: u32,
    remaining: u32,
    reset_after: u64,
    max_concurrency: u32,
}

/// Fetches the WebSocket URL from the Get Gateway Bot endpoint.
pub(crate) async fn fetch_gateway_url(token: &str) -> Result<String, ClientError> {
    debug!("requesting gateway url");
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let response = client
        .get(format!("{API_BASE}/gateway/bot"))
        .header(AUTHORIZATION, token)
        .send()
        .await?
        .error_for_status()?;
    let body: GetGatewayBot = response.json().await?;

    let limit = &body.session_start_limit;
    info!(
        url = %body.url,
        shards = body.shards,
        remaining_starts = limit.remaining,
        total_starts = limit.total,
        max_concurrency = limit.max_concurrency,
        reset_after_ms = limit.reset_after,
        "fetched gateway url"
    );
    Ok(body.url)
}

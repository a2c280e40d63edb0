//! A simple command-line interface for connecting to the Discord Gateway.
//!
//! Connects with the given token and intents, then logs every dispatched
//! event until interrupted.

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use discord_gateway::client::Client;
use discord_gateway::protocol::Intents;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "discord-gateway")]
#[command(about = "Connect to the Discord Gateway and log dispatched events")]
#[command(version)]
#[command(group(ArgGroup::new("token_source").required(true)))]
#[command(group(ArgGroup::new("intent_flags").required(true)))]
struct Cli {
    /// The bot token (without the "Bot " prefix)
    #[arg(long, group = "token_source")]
    token: Option<String>,

    /// Read the token from this environment variable instead
    #[arg(long, value_name = "VAR", group = "token_source")]
    env_token: Option<String>,

    /// Do not enable any intents
    #[arg(long, group = "intent_flags")]
    no_intents: bool,

    /// Enable all non-privileged intents
    #[arg(long, group = "intent_flags")]
    standard_intents: bool,

    /// Enable standard and privileged intents
    #[arg(long, group = "intent_flags")]
    all_intents: bool,

    /// The intents value to use, as a raw bitmask
    #[arg(long, group = "intent_flags", value_name = "BITS")]
    intents: Option<u64>,

    /// Use zlib transport compression
    #[arg(long)]
    zlib_stream: bool,

    /// Log level directive (e.g. info, debug, discord_gateway_client=trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn token(&self) -> anyhow::Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        if let Some(var) = &self.env_token {
            return std::env::var(var)
                .with_context(|| format!("environment variable {var} is not set"));
        }
        bail!("a token is required");
    }

    fn intents(&self) -> Intents {
        if self.standard_intents {
            Intents::standard()
        } else if self.all_intents {
            Intents::all()
        } else if let Some(bits) = self.intents {
            Intents::from_bits_truncate(bits)
        } else {
            Intents::none()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_new(&cli.log_level).context("invalid log level")?)
        .init();

    let token = cli.token()?;
    let intents = cli.intents();
    info!(intents = intents.bits(), zlib_stream = cli.zlib_stream, "starting client");

    let mut client = Client::new(format!("Bot {token}"), intents)
        .with_zlib_stream(cli.zlib_stream);

    client.on_dispatch(|event| async move {
        info!(name = %event.name, seq = event.seq, "dispatch");
        Ok(())
    });

    let handle = client.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            handle.shutdown();
        }
    });

    client.run().await?;
    Ok(())
}

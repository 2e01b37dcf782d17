mod bridge;
mod config;
mod convert;
mod discord;
mod error;
mod message_map;
mod relay;
mod router;
mod telegram;

#[cfg(test)]
mod testing;

use anyhow::Result;
use bridge::BridgeRegistry;
use config::Config;
use convert::Mentions;
use discord::{DiscordBot, Handler, ReadyGate};
use message_map::{MessageMap, MessageStore};
use relay::Relay;
use router::Router;
use std::sync::Arc;
use telegram::TelegramClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("Starting Telecord - Telegram <-> Discord bridge");

    // Load configuration
    let config = Config::new()?;
    let bridges = config.load_bridges()?;
    let registry = Arc::new(BridgeRegistry::new(bridges.bridges)?);
    info!(bridges = registry.len(), "Configuration loaded");

    let messages: Arc<dyn MessageStore> = Arc::new(MessageMap::new(config.message_map_capacity));

    // Discord calls wait on this until the gateway reports ready
    let ready = ReadyGate::new();
    let discord_bot = DiscordBot::new(&config, ready.clone());

    let telegram = Arc::new(TelegramClient::new(&config));
    let bot_username = telegram.username().await?;
    info!("Connected to Telegram as {}", bot_username);

    if config.skip_old_messages {
        telegram.skip_pending_updates().await?;
    }

    let relay = Arc::new(Relay::new(
        Arc::new(discord_bot.clone()),
        telegram.clone(),
        messages,
        Mentions::new(bridges.mentions),
    ));
    let router = Arc::new(Router::new(
        registry.clone(),
        relay.clone(),
        telegram.clone(),
        bot_username,
    ));

    let handler = Handler::new(registry, relay, ready);
    let bot = telegram.bot().clone();

    tokio::select! {
        result = discord_bot.start(handler) => {
            if let Err(e) = &result {
                error!("Discord client stopped: {}", e);
            }
            result?;
        }
        _ = telegram::run_dispatcher(bot, router) => {
            info!("Telegram dispatcher stopped");
        }
    }

    Ok(())
}

use crate::bridge::{Bridge, BridgeRegistry};
use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;

const DEFAULT_BRIDGES_FILE: &str = "bridges.json";

pub struct Config {
    pub telegram_token: String,
    pub discord_token: String,
    pub bridges_file: String,
    pub skip_old_messages: bool,
    pub message_map_capacity: Option<usize>,
}

/// Contents of the bridges file.
#[derive(Debug, Default, Deserialize)]
pub struct BridgesFile {
    pub bridges: Vec<Bridge>,
    /// Telegram handle (without `@`) to Discord user id.
    #[serde(default)]
    pub mentions: HashMap<String, u64>,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load environment variables from .env file
        dotenv().ok();

        let telegram_token = env::var("TELEGRAM_TOKEN")
            .map_err(|_| anyhow!("Expected TELEGRAM_TOKEN in the environment"))?;

        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| anyhow!("Expected DISCORD_TOKEN in the environment"))?;

        let bridges_file =
            env::var("BRIDGES_FILE").unwrap_or_else(|_| DEFAULT_BRIDGES_FILE.to_string());

        let skip_old_messages = match env::var("SKIP_OLD_MESSAGES") {
            Ok(value) => parse_bool(&value)
                .ok_or_else(|| anyhow!("SKIP_OLD_MESSAGES must be true or false, got {}", value))?,
            Err(_) => true,
        };

        // Unset means the correspondence table grows without bound
        let message_map_capacity =
            parse_capacity(env::var("MESSAGE_MAP_CAPACITY").ok().as_deref())?;

        Ok(Self {
            telegram_token,
            discord_token,
            bridges_file,
            skip_old_messages,
            message_map_capacity,
        })
    }

    pub fn load_bridges(&self) -> Result<BridgesFile> {
        let contents = fs::read_to_string(&self.bridges_file)
            .with_context(|| format!("Failed to read bridges file {}", self.bridges_file))?;
        parse_bridges(&contents)
    }
}

pub fn parse_bridges(contents: &str) -> Result<BridgesFile> {
    let file: BridgesFile =
        serde_json::from_str(contents).context("Failed to parse bridges file")?;

    if file.bridges.is_empty() {
        return Err(anyhow!("Bridges file defines no bridges"));
    }

    // Fail early on duplicate chat ids instead of at registry build time
    BridgeRegistry::new(file.bridges.clone())?;

    Ok(file)
}

fn parse_capacity(value: Option<&str>) -> Result<Option<usize>> {
    value
        .map(|value| match value.trim().parse::<usize>() {
            Ok(capacity) if capacity > 0 => Ok(capacity),
            _ => Err(anyhow!(
                "MESSAGE_MAP_CAPACITY must be a positive integer, got {}",
                value
            )),
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

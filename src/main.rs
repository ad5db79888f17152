use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chefcode::chat_client::OpenAiClient;
use chefcode::config::ServerConfig;
use chefcode::localization::get_localization_manager;
use chefcode::server::{start_server, AppState};
use chefcode::state::AppData;
use chefcode::storage::FileStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    // Also bridges `log` records from the core modules
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    info!("Starting ChefCode backend");

    let config = ServerConfig::from_env().context("Invalid configuration")?;

    if !get_localization_manager().supports(&config.language) {
        warn!(language = %config.language, "Unsupported language, replies fall back to Italian");
    }

    let store = FileStore::open(&config.data_dir)?;
    let data = AppData::load(&store).context("Failed to load saved snapshot")?;
    let chat = OpenAiClient::new(config.chat.clone())?;

    let state = AppState::new(data, Arc::new(store), Arc::new(chat), config);
    start_server(state).await
}

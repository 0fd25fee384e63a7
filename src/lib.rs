pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;

use agent::TurnController;
use cli::Args;
use config::AppConfig;
use config::persona::load_personas_or_builtin;
use error::ChatError;
use log::{info, warn};
use server::{ChatState, Server};
use std::error::Error;
use std::sync::Arc;

/// Validates configuration and builds the shared state. Any failure here is
/// fatal for the process.
pub fn build_state(args: &Args) -> Result<(AppConfig, Arc<ChatState>), ChatError> {
    let config = AppConfig::from_args(args)?;
    let personas = load_personas_or_builtin(args.personas_path.as_deref())
        .map_err(|e| ChatError::Configuration(e.to_string()))?;
    let controller = TurnController::from_config(&config)?;
    Ok((config, Arc::new(ChatState { controller, personas })))
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (config, state) = build_state(&args)?;

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP API Port: {:?}", args.http_port);
    info!("Chat LLM Type: {}", config.chat.llm_type);
    info!("Chat Timeout: {:?}", config.chat_timeout);
    info!("Store Type: {}", config.store_type);
    info!("Store Key Prefix: {}", config.key_prefix);
    info!("Store Write Mode: {}", config.write_mode);
    info!("Personas: {}", state.personas.len());
    info!("Handshake Auth: {}", args.server_api_key.as_deref().is_some_and(|k| !k.is_empty()));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if args.enable_tls && rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed; keeping it.");
    }

    let addr = args.server_addr.clone();
    let server = Server::new(addr, state, args);
    server.run().await?;

    Ok(())
}

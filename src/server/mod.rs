pub mod api;
pub mod websocket;

use crate::agent::TurnController;
use crate::cli::Args;
use crate::config::persona::PersonaCatalog;
use std::error::Error;
use std::sync::Arc;

/// Shared, read-only state handed to every connection and request.
pub struct ChatState {
    pub controller: TurnController,
    pub personas: Arc<PersonaCatalog>,
}

pub struct Server {
    addr: String,
    state: Arc<ChatState>,
    args: Args,
}

impl Server {
    pub fn new(
        addr: String,
        state: Arc<ChatState>,
        args: Args,
    ) -> Self {
        Self {
            addr,
            state,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(
            http_port,
            self.state.clone(),
            self.args.clone(),
        ).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            self.state.clone(),
            self.args.server_api_key.clone(),
            self.args.clone(),
        ).await
    }
}

//! Telegram transport.
//!
//! The bot is a thin client: it forwards inbound messages (text or photos)
//! to the session coordinator and renders the outcomes as plain text. All
//! interpretation and ledger logic lives behind the coordinator.

use std::sync::Arc;

use assistant::{Coordinator, GeminiClient};
use teloxide::prelude::*;

mod export;
mod handlers;
mod ui;

#[derive(Clone)]
pub struct ConfigParameters {
    coordinator: Arc<Coordinator<GeminiClient>>,
}

pub struct Bot {
    token: String,
    coordinator: Arc<Coordinator<GeminiClient>>,
}

impl Bot {
    pub fn new(token: &str, coordinator: Arc<Coordinator<GeminiClient>>) -> Self {
        Self {
            token: token.to_string(),
            coordinator,
        }
    }

    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub async fn run(&self) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);
        let parameters = ConfigParameters {
            coordinator: self.coordinator.clone(),
        };

        let handler =
            dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::warn!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[derive(Default)]
pub struct BotBuilder {
    token: String,
    coordinator: Option<Arc<Coordinator<GeminiClient>>>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn coordinator(mut self, coordinator: Arc<Coordinator<GeminiClient>>) -> BotBuilder {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.is_empty() {
            return Err("telegram token missing".to_string());
        }
        let coordinator = self
            .coordinator
            .ok_or_else(|| "coordinator missing".to_string())?;
        Ok(Bot::new(&self.token, coordinator))
    }
}

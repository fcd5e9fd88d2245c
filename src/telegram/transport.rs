//! `sendMessage` transport.

use super::BotApiClient;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Sends notifications with the Bot API `sendMessage` method.
///
/// Link previews are disabled so forwarded snippets stay compact.
#[derive(Debug, Clone)]
pub struct BotApiTransport {
    client: Arc<BotApiClient>,
}

impl BotApiTransport {
    /// Creates a transport over a shared client.
    #[must_use]
    pub const fn new(client: Arc<BotApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for BotApiTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        let params = SendMessage {
            chat_id: destination,
            text,
            disable_web_page_preview: true,
        };
        self.client
            .call::<_, serde_json::Value>("sendMessage", &params, None)
            .await
            .map(|_| ())
    }
}

use anyhow::Context;
use async_trait::async_trait;
use kafka_consumer::MessageHandler;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The fields of a clickstream call the router cares about. Everything else
/// in the payload is ignored.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: Option<String>,
    pub message_id: Option<String>,
    pub user_id: Option<String>,
    pub anonymous_id: Option<String>,
}

impl ClickEvent {
    pub fn parse(value: &[u8]) -> anyhow::Result<ClickEvent> {
        serde_json::from_slice(value).context("payload is not a clickstream event")
    }
}

/// Decodes clickstream payloads and logs them.
pub struct ClickstreamHandler;

#[async_trait]
impl MessageHandler for ClickstreamHandler {
    async fn handle_message(
        &self,
        value: Vec<u8>,
        key: Vec<u8>,
        _cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let event = ClickEvent::parse(&value)?;
        let key = String::from_utf8_lossy(&key);

        info!(
            key = %key,
            kind = %event.kind,
            event = event.event.as_deref().unwrap_or(""),
            message_id = event.message_id.as_deref().unwrap_or(""),
            "Routing clickstream event"
        );
        debug!(
            user_id = event.user_id.as_deref().unwrap_or(""),
            anonymous_id = event.anonymous_id.as_deref().unwrap_or(""),
            bytes = value.len(),
            "Clickstream event identity"
        );
        Ok(())
    }
}

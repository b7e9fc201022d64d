use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Domain processing for consumed messages.
///
/// Invocations run concurrently on the dispatch workers, so
/// `handle_message` must be safe to call from several tasks at once and gives
/// no ordering guarantee between messages, even within a partition.
///
/// `cancel` fires when shutdown gives up waiting for outstanding work; long
/// running handlers should watch it and return early. A returned error is
/// logged and counted but does not affect consumption or offset commits.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle_message(
        &self,
        value: Vec<u8>,
        key: Vec<u8>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;
}

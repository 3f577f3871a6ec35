//! Pattern-subscribe over a dedicated connection, with exponential-backoff
//! reconnect capped at 30s (§4.3). Messages published while disconnected are
//! lost — callers that need stronger guarantees pair this with a polling
//! fallback (the disconnect worker and notification listener both do).

use crate::error::TtlStoreResult;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A message received from a pattern subscription.
#[derive(Debug, Clone)]
pub struct PatternMessage {
    pub channel: String,
    pub payload: String,
}

/// Subscribes to a channel pattern and forwards messages on `mpsc::Receiver`
/// until the returned task handle is dropped. Reconnects transparently.
pub fn spawn_pattern_subscriber(
    client: redis::Client,
    pattern: String,
) -> (mpsc::Receiver<PatternMessage>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let handle = tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match run_once(&client, &pattern, &tx).await {
                Ok(()) => {
                    // Subscriber loop only returns Ok when the channel closed
                    // on our side (receiver dropped) — stop trying.
                    return;
                }
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, backoff_ms = backoff.as_millis(), "ttl store subscriber disconnected, reconnecting");
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
        }
    });
    (rx, handle)
}

async fn run_once(
    client: &redis::Client,
    pattern: &str,
    tx: &mpsc::Sender<PatternMessage>,
) -> TtlStoreResult<()> {
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe(pattern).await?;
    debug!(pattern, "ttl store subscriber (re)connected");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel: String = msg.get_channel_name().to_string();
        let payload: String = msg.get_payload().unwrap_or_default();
        if tx
            .send(PatternMessage { channel, payload })
            .await
            .is_err()
        {
            return Ok(());
        }
    }
    // Stream ended: the server closed the connection under us.
    Err(crate::error::TtlStoreError::Transport(
        redis::RedisError::from((redis::ErrorKind::IoError, "pubsub stream ended")),
    ))
}

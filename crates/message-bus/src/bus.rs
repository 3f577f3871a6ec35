//! Best-effort topic pub/sub fan-out across control-plane instances (§4.3).
//!
//! Used only for the three channel families named in the spec: the RPC
//! request channel per router (`rpc/<router-id>`), the RPC response channel
//! per instance (`rpc/response/<instance-id>`), and the tunnel channel per
//! router. Delivery is at-most-once; ordering across channels is not
//! guaranteed, and the core must not depend on in-order delivery within one
//! channel either (command-ids and session-ids do the correlating).
//!
//! On subscriber loss the bus reconnects with exponential backoff capped at
//! 30s and resubscribes; messages published while disconnected are lost.

use crate::error::{BusError, BusResult};
use futures_util::StreamExt;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A message delivered off one subscribed channel.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

/// A thin publish handle plus a subscribe factory. Cheap to clone: the
/// publish path shares a `ConnectionManager`; each subscribe call opens its
/// own dedicated connection (subscribing blocks the connection for other
/// commands in the `redis` client model).
#[derive(Clone)]
pub struct MessageBus {
    client: redis::Client,
    publish_conn: redis::aio::ConnectionManager,
}

impl MessageBus {
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = redis::Client::open(url)?;
        let publish_conn = client.get_connection_manager().await?;
        Ok(Self { client, publish_conn })
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> BusResult<()> {
        let receivers: i64 = self.publish_conn.clone().publish(channel, payload).await?;
        debug!(channel, receivers, "published to message bus");
        Ok(())
    }

    pub async fn publish_json<T: Serialize>(&self, channel: &str, value: &T) -> BusResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.publish(channel, &encoded).await
    }

    /// Subscribe to one exact channel name. Returns a receiver of raw
    /// messages and the task handle driving the reconnect loop; dropping
    /// the receiver stops the task.
    pub fn subscribe(&self, channel: String) -> (mpsc::Receiver<BusMessage>, tokio::task::JoinHandle<()>) {
        let client = self.client.clone();
        let (tx, rx) = mpsc::channel(256);
        let handle = tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match run_subscription(&client, &channel, &tx).await {
                    Ok(()) => return,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, backoff_ms = backoff.as_millis(), "message bus subscriber disconnected, reconnecting");
                    }
                }
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
            }
        });
        (rx, handle)
    }

    pub async fn decode<T: DeserializeOwned>(message: &BusMessage) -> BusResult<T> {
        Ok(serde_json::from_str(&message.payload)?)
    }
}

async fn run_subscription(
    client: &redis::Client,
    channel: &str,
    tx: &mpsc::Sender<BusMessage>,
) -> BusResult<()> {
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(channel).await?;
    debug!(channel, "message bus subscriber (re)connected");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel_name = msg.get_channel_name().to_string();
        let payload: String = msg.get_payload().unwrap_or_default();
        if tx
            .send(BusMessage {
                channel: channel_name,
                payload,
            })
            .await
            .is_err()
        {
            return Ok(());
        }
    }
    Err(BusError::Transport(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "pubsub stream ended",
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_message_carries_channel_and_payload() {
        let message = BusMessage {
            channel: "rpc/router-1".to_string(),
            payload: "{}".to_string(),
        };
        assert_eq!(message.channel, "rpc/router-1");
    }
}

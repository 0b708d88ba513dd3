use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// Connection attempts before a bus operation surfaces its error.
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Seam over the pub/sub backbone. The production implementation is Redis;
/// tests and embedded deployments use [`MemoryTransport`].
#[async_trait]
pub trait BusTransport: Send + Sync {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()>;
    async fn ping(&self) -> Result<()>;
    /// Open a subscription on the dedicated subscribe connection and stream
    /// raw payloads into the returned receiver.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>>;
    /// Tear down deterministically: publish side first, subscribe side last,
    /// so consumers expecting continued delivery are not orphaned mid-stream.
    async fn close(&self);
}

/// Redis pub/sub transport. Two long-lived connections — a multiplexed one
/// for publishing and a dedicated pubsub one per subscription — each
/// established lazily and retried a fixed number of times. Connection
/// failures are surfaced to the caller, never hidden.
pub struct RedisTransport {
    client: redis::Client,
    publish_conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
    subscriber_tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl RedisTransport {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("invalid event bus URL: {}", url))?;
        Ok(Self {
            client,
            publish_conn: Mutex::new(None),
            subscriber_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Get-or-create the shared publish connection. First caller connects;
    /// subsequent callers reuse the same handle.
    async fn publish_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.publish_conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => {
                    info!("event bus publish connection established");
                    *guard = Some(conn.clone());
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(
                        "event bus connect failed (attempt {}/{}): {}",
                        attempt, CONNECT_ATTEMPTS, e
                    );
                    last_err = Some(e);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt ran")).context("event bus connection failed")
    }
}

#[async_trait]
impl BusTransport for RedisTransport {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self.publish_conn().await?;
        let _: () = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("publish to {} failed", channel))?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.publish_conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("event bus ping failed")?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.client.get_async_pubsub().await {
                Ok(mut pubsub) => {
                    pubsub
                        .subscribe(channel)
                        .await
                        .with_context(|| format!("subscribe to {} failed", channel))?;
                    let (tx, rx) = mpsc::unbounded_channel();
                    let channel_name = channel.to_string();
                    let handle = tokio::spawn(async move {
                        let mut stream = pubsub.on_message();
                        while let Some(msg) = stream.next().await {
                            match msg.get_payload::<Vec<u8>>() {
                                Ok(payload) => {
                                    if tx.send(payload).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    error!("bad payload on {}: {}", channel_name, e);
                                }
                            }
                        }
                        debug!("subscription to {} ended", channel_name);
                    });
                    self.subscriber_tasks.lock().await.push(handle);
                    info!("subscribed to event bus channel {}", channel);
                    return Ok(rx);
                }
                Err(e) => {
                    warn!(
                        "event bus subscribe connect failed (attempt {}/{}): {}",
                        attempt, CONNECT_ATTEMPTS, e
                    );
                    last_err = Some(e);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt ran"))
            .context("event bus subscribe connection failed")
    }

    async fn close(&self) {
        // Publish side first: callers await publishes inline, so dropping the
        // handle here leaves nothing in flight.
        self.publish_conn.lock().await.take();
        // Subscribe side last.
        for handle in self.subscriber_tasks.lock().await.drain(..) {
            handle.abort();
        }
        info!("event bus connections closed");
    }
}

/// In-process transport backed by tokio channels. Used in tests and when the
/// gateway runs without an external backbone; keeps a log of published
/// payloads for assertions.
#[derive(Default)]
pub struct MemoryTransport {
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in order.
    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl BusTransport for MemoryTransport {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        self.published
            .lock()
            .await
            .push((channel.to_string(), payload.to_vec()));
        if let Some(senders) = self.subscribers.lock().await.get_mut(channel) {
            senders.retain(|tx| tx.send(payload.to_vec()).is_ok());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn close(&self) {
        self.subscribers.lock().await.clear();
    }
}

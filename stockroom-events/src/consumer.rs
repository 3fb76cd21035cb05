//! Retrying consumer with dead-letter routing.
//!
//! Each subscribed channel gets one listener task that processes messages
//! one at a time. A failing delivery is retried under the [`RetryPolicy`];
//! once attempts run out the message is republished to `<channel>.DLT` on
//! its original partition with the `dlt-*` headers. If that publish fails
//! too, the message is logged in full at error level and counted as lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stockroom_core::{EventError, StockroomResult};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::handler::MessageHandler;
use crate::message::{Message, OutboundMessage};
use crate::retry::RetryPolicy;
use crate::transport::ChannelTransport;

// ============================================================================
// DELIVERY STATE
// ============================================================================

/// Lifecycle of one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Received,
    Processing { attempt: u32 },
    Retrying { attempt: u32 },
    Acknowledged,
    DeadLettered,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::DeadLettered)
    }
}

/// Final result of processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acknowledged {
        attempts: u32,
    },
    DeadLettered {
        attempts: u32,
        error: EventError,
        /// The copy on the dead-letter channel, or `None` if routing it
        /// failed and the message was logged as lost.
        dead_letter: Option<Message>,
    },
}

impl DeliveryOutcome {
    pub fn state(&self) -> DeliveryState {
        match self {
            Self::Acknowledged { .. } => DeliveryState::Acknowledged,
            Self::DeadLettered { .. } => DeliveryState::DeadLettered,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Acknowledged { attempts } | Self::DeadLettered { attempts, .. } => *attempts,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for consumer activity.
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Messages taken off a channel.
    pub received: AtomicU64,
    /// Messages processed successfully.
    pub acknowledged: AtomicU64,
    /// Redelivery attempts after a failure.
    pub retried: AtomicU64,
    /// Messages routed to a dead-letter channel.
    pub dead_lettered: AtomicU64,
    /// Messages that exhausted retries and could not be dead-lettered.
    pub lost: AtomicU64,
    /// Messages recovered from the retained log after the subscriber lagged.
    pub replayed: AtomicU64,
    /// Messages that left the retained log before a lagging subscriber
    /// could replay them.
    pub expired: AtomicU64,
}

impl ConsumerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConsumerSnapshot {
        ConsumerSnapshot {
            received: self.received.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of consumer metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSnapshot {
    pub received: u64,
    pub acknowledged: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub lost: u64,
    pub replayed: u64,
    pub expired: u64,
}

// ============================================================================
// CONSUMER
// ============================================================================

#[derive(Clone)]
pub struct ChangeEventConsumer {
    transport: Arc<dyn ChannelTransport>,
    retry: RetryPolicy,
    metrics: Arc<ConsumerMetrics>,
}

impl ChangeEventConsumer {
    pub fn new(transport: Arc<dyn ChannelTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            metrics: Arc::new(ConsumerMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<ConsumerMetrics> {
        &self.metrics
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `handler` on `message` until it succeeds or attempts run out,
    /// then dead-letter it.
    pub async fn process(&self, message: &Message, handler: &dyn MessageHandler) -> DeliveryOutcome {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);
        debug!(
            channel = %message.channel,
            offset = message.offset,
            state = ?DeliveryState::Received,
            "Message received"
        );

        let mut attempt = 1;
        loop {
            debug!(
                channel = %message.channel,
                offset = message.offset,
                handler = handler.name(),
                state = ?DeliveryState::Processing { attempt },
                "Processing message"
            );

            let error = match handler.handle(message).await {
                Ok(()) => {
                    self.metrics.acknowledged.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        channel = %message.channel,
                        offset = message.offset,
                        attempts = attempt,
                        "Message acknowledged"
                    );
                    return DeliveryOutcome::Acknowledged { attempts: attempt };
                }
                Err(error) => error,
            };

            if !self.retry.should_retry(attempt) {
                return self.dead_letter(message, error, attempt).await;
            }

            let delay = self.retry.backoff(attempt);
            warn!(
                channel = %message.channel,
                offset = message.offset,
                handler = handler.name(),
                attempt,
                max_attempts = self.retry.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                state = ?DeliveryState::Retrying { attempt },
                "Message processing failed, retrying"
            );
            self.metrics.retried.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn dead_letter(&self, message: &Message, error: EventError, attempts: u32) -> DeliveryOutcome {
        let outbound = OutboundMessage::dead_letter(message, &error.to_string(), attempts);
        let target = outbound.channel.clone();

        let dead_letter = match self.transport.publish(outbound).await {
            Ok(routed) => {
                self.metrics.dead_lettered.fetch_add(1, Ordering::Relaxed);
                error!(
                    channel = %message.channel,
                    offset = message.offset,
                    dead_letter_channel = %routed.channel,
                    dead_letter_offset = routed.offset,
                    attempts,
                    error = %error,
                    "Message dead-lettered"
                );
                Some(routed)
            }
            Err(publish_error) => {
                self.metrics.lost.fetch_add(1, Ordering::Relaxed);
                let failure = EventError::DeadLetterFailed {
                    channel: target,
                    reason: publish_error.to_string(),
                };
                error!(
                    channel = %message.channel,
                    partition = message.partition,
                    offset = message.offset,
                    key = ?message.key,
                    payload = %message.payload,
                    headers = ?message.headers,
                    attempts,
                    processing_error = %error,
                    error = %failure,
                    "Message could not be dead-lettered"
                );
                None
            }
        };

        DeliveryOutcome::DeadLettered {
            attempts,
            error,
            dead_letter,
        }
    }

    /// Start a listener task on `channel`.
    ///
    /// The subscription is taken before this returns, so every message
    /// published afterwards reaches `handler` and nothing published before
    /// does. The task ends when `shutdown` flips to `true` or its sender is
    /// dropped.
    pub fn spawn(
        &self,
        channel: &str,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> StockroomResult<JoinHandle<()>> {
        let subscription = self.transport.subscribe(channel)?;
        let mut rx = subscription.receiver;
        // Next unprocessed offset per partition.
        let mut cursor: HashMap<u32, u64> = subscription.start_offsets;
        let consumer = self.clone();
        let channel = channel.to_string();

        info!(channel = %channel, handler = handler.name(), "Consumer started");

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    received = rx.recv() => match received {
                        Ok(message) => {
                            consumer.deliver(&message, handler.as_ref(), &mut cursor).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(channel = %channel, skipped, "Consumer lagged, replaying from retained log");
                            consumer.replay(&channel, handler.as_ref(), &mut cursor).await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            info!(channel = %channel, "Consumer stopped");
        }))
    }

    async fn deliver(
        &self,
        message: &Message,
        handler: &dyn MessageHandler,
        cursor: &mut HashMap<u32, u64>,
    ) {
        let next = cursor.entry(message.partition).or_insert(0);
        if message.offset < *next {
            return;
        }
        *next = message.offset + 1;
        self.process(message, handler).await;
    }

    async fn replay(
        &self,
        channel: &str,
        handler: &dyn MessageHandler,
        cursor: &mut HashMap<u32, u64>,
    ) {
        let missed = self.transport.replay_from(channel, cursor);

        let mut expired = 0;
        let mut first_seen: HashMap<u32, u64> = HashMap::new();
        for message in &missed {
            first_seen.entry(message.partition).or_insert(message.offset);
        }
        for (partition, first) in first_seen {
            let next = cursor.get(&partition).copied().unwrap_or(0);
            expired += first.saturating_sub(next);
        }
        if expired > 0 {
            self.metrics.expired.fetch_add(expired, Ordering::Relaxed);
            error!(
                channel = %channel,
                expired,
                "Missed messages aged out of the retained log"
            );
        }

        self.metrics
            .replayed
            .fetch_add(missed.len() as u64, Ordering::Relaxed);
        for message in &missed {
            self.deliver(message, handler, cursor).await;
        }
    }
}

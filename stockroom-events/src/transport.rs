//! Channel transport trait and the in-process broker.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use stockroom_core::constants::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHANNEL_RETENTION, DEFAULT_PARTITIONS,
};
use stockroom_core::{EventConfig, EventError, StockroomResult};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::message::{Message, OutboundMessage};

/// Publish/subscribe transport for named channels.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Append a message to its channel and deliver it to live subscribers.
    ///
    /// Returning `Ok` means the transport accepted the message; it says
    /// nothing about consumption.
    async fn publish(&self, message: OutboundMessage) -> StockroomResult<Message>;

    /// Receive every message published to `channel` from now on.
    fn subscribe(&self, channel: &str) -> StockroomResult<Subscription>;

    /// Retained messages on `channel` at or past `cursor`, in publish order.
    ///
    /// `cursor` maps a partition to its next unprocessed offset; partitions
    /// without an entry start at 0. Consumers advance through the log in
    /// publish order, so the walk stops at the newest message already
    /// behind the cursor.
    fn replay_from(&self, channel: &str, cursor: &HashMap<u32, u64>) -> Vec<Message>;

    /// The retained window of `channel`, oldest first.
    fn published(&self, channel: &str) -> Vec<Message>;
}

/// A live receiver plus the position it starts at.
#[derive(Debug)]
pub struct Subscription {
    pub receiver: broadcast::Receiver<Message>,
    /// Next offset per partition when the receiver was created. Everything
    /// below these offsets predates the subscription.
    pub start_offsets: HashMap<u32, u64>,
}

struct ChannelLog {
    messages: VecDeque<Message>,
    next_offsets: Vec<u64>,
}

struct ChannelState {
    tx: broadcast::Sender<Message>,
    log: Mutex<ChannelLog>,
}

/// In-process broker with per-channel broadcast delivery and a bounded
/// retained log.
///
/// Channels are created on first use. Each has a fixed number of
/// partitions; keyed messages hash onto a partition, unkeyed messages go to
/// partition 0. The retained log keeps the newest `retention` messages per
/// channel so a lagging subscriber can replay what it missed and operators
/// can inspect dead-letter channels.
pub struct InMemoryBroker {
    channels: DashMap<String, Arc<ChannelState>>,
    capacity: usize,
    partitions: u32,
    retention: usize,
    closed: AtomicBool,
}

impl InMemoryBroker {
    pub fn new(capacity: usize, partitions: u32) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            partitions: partitions.max(1),
            retention: DEFAULT_CHANNEL_RETENTION,
            closed: AtomicBool::new(false),
        }
    }

    /// Keep at most `retention` messages per channel.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn from_config(config: &EventConfig) -> Self {
        Self::new(config.channel_capacity, config.partitions).with_retention(config.retention)
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Reject every later publish with `EventError::TransportClosed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Names of channels that have seen a publish or a subscriber.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn channel(&self, name: &str) -> Arc<ChannelState> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(self.capacity);
                Arc::new(ChannelState {
                    tx,
                    log: Mutex::new(ChannelLog {
                        messages: VecDeque::new(),
                        next_offsets: vec![0; self.partitions as usize],
                    }),
                })
            })
            .clone()
    }

    fn partition_for(&self, message: &OutboundMessage) -> u32 {
        match (message.partition, &message.key) {
            (Some(partition), _) => partition % self.partitions,
            (None, Some(key)) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % u64::from(self.partitions)) as u32
            }
            (None, None) => 0,
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, DEFAULT_PARTITIONS)
    }
}

#[async_trait]
impl ChannelTransport for InMemoryBroker {
    async fn publish(&self, outbound: OutboundMessage) -> StockroomResult<Message> {
        if self.is_closed() {
            return Err(EventError::TransportClosed {
                channel: outbound.channel,
            }
            .into());
        }

        let partition = self.partition_for(&outbound);
        let state = self.channel(&outbound.channel);
        let mut log = state.log.lock().map_err(|_| EventError::TransportClosed {
            channel: outbound.channel.clone(),
        })?;

        let offset = log.next_offsets[partition as usize];
        log.next_offsets[partition as usize] += 1;

        let message = Message {
            id: Uuid::now_v7(),
            channel: outbound.channel,
            partition,
            offset,
            key: outbound.key,
            payload: outbound.payload,
            headers: outbound.headers,
            published_at: Utc::now(),
        };
        log.messages.push_back(message.clone());
        while log.messages.len() > self.retention {
            log.messages.pop_front();
        }

        // Sending under the log lock keeps delivery order equal to log order.
        let receivers = state.tx.send(message.clone()).unwrap_or(0);
        debug!(
            channel = %message.channel,
            partition,
            offset,
            receivers,
            "Message published"
        );
        Ok(message)
    }

    fn subscribe(&self, channel: &str) -> StockroomResult<Subscription> {
        let state = self.channel(channel);
        // Holding the log lock orders the snapshot against concurrent publishes.
        let log = state.log.lock().map_err(|_| EventError::TransportClosed {
            channel: channel.to_string(),
        })?;

        let start_offsets = log
            .next_offsets
            .iter()
            .enumerate()
            .map(|(partition, next)| (partition as u32, *next))
            .collect();

        Ok(Subscription {
            receiver: state.tx.subscribe(),
            start_offsets,
        })
    }

    fn replay_from(&self, channel: &str, cursor: &HashMap<u32, u64>) -> Vec<Message> {
        let Some(state) = self.channels.get(channel).map(|e| e.value().clone()) else {
            return Vec::new();
        };
        let Ok(log) = state.log.lock() else {
            return Vec::new();
        };

        let mut missed: Vec<Message> = log
            .messages
            .iter()
            .rev()
            .take_while(|m| m.offset >= cursor.get(&m.partition).copied().unwrap_or(0))
            .cloned()
            .collect();
        missed.reverse();
        missed
    }

    fn published(&self, channel: &str) -> Vec<Message> {
        self.channels
            .get(channel)
            .and_then(|state| {
                state
                    .log
                    .lock()
                    .ok()
                    .map(|log| log.messages.iter().cloned().collect())
            })
            .unwrap_or_default()
    }
}

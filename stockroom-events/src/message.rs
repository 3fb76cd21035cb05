//! Message envelope carried by channel transports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stockroom_core::constants::DEAD_LETTER_SUFFIX;
use stockroom_core::Timestamp;
use uuid::Uuid;

/// Header names attached to dead-lettered messages.
pub mod headers {
    pub const ORIGINAL_CHANNEL: &str = "dlt-original-channel";
    pub const ORIGINAL_PARTITION: &str = "dlt-original-partition";
    pub const ORIGINAL_OFFSET: &str = "dlt-original-offset";
    pub const EXCEPTION_MESSAGE: &str = "dlt-exception-message";
    pub const ATTEMPTS: &str = "dlt-attempts";
    /// Set by the change event publisher.
    pub const CHANGE_KIND: &str = "change-kind";
}

/// Name of the dead-letter channel for `channel`.
pub fn dead_letter_channel(channel: &str) -> String {
    format!("{}{}", channel, DEAD_LETTER_SUFFIX)
}

/// A message as stored and delivered by a transport.
///
/// `offset` increases by one per message within a `(channel, partition)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel: String,
    pub partition: u32,
    pub offset: u64,
    pub key: Option<String>,
    pub payload: String,
    pub headers: BTreeMap<String, String>,
    pub published_at: Timestamp,
}

impl Message {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_dead_letter(&self) -> bool {
        self.channel.ends_with(DEAD_LETTER_SUFFIX)
    }
}

/// A message handed to a transport for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub key: Option<String>,
    /// Explicit partition; when absent the transport derives one from `key`.
    pub partition: Option<u32>,
    pub payload: String,
    pub headers: BTreeMap<String, String>,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            key: None,
            partition: None,
            payload: payload.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Build the dead-letter copy of `original` after `attempts` failed
    /// deliveries. The copy keeps payload, key, partition and existing
    /// headers, and adds the `dlt-*` headers.
    pub fn dead_letter(original: &Message, error: &str, attempts: u32) -> Self {
        let mut outbound = Self::new(
            dead_letter_channel(&original.channel),
            original.payload.clone(),
        )
        .with_partition(original.partition);
        outbound.key = original.key.clone();
        outbound.headers = original.headers.clone();
        outbound
            .with_header(headers::ORIGINAL_CHANNEL, original.channel.clone())
            .with_header(headers::ORIGINAL_PARTITION, original.partition.to_string())
            .with_header(headers::ORIGINAL_OFFSET, original.offset.to_string())
            .with_header(headers::EXCEPTION_MESSAGE, error)
            .with_header(headers::ATTEMPTS, attempts.to_string())
    }
}

//! Message handlers run by consumers.

use async_trait::async_trait;
use stockroom_core::EventError;
use tracing::info;

use crate::message::Message;

/// Processes one delivered message.
///
/// An `Err` means the delivery failed and the consumer may retry it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, message: &Message) -> Result<(), EventError>;
}

/// Handler for product change events.
///
/// Rejects any payload containing the fail marker, which is how poison
/// messages are injected end to end.
#[derive(Debug, Clone)]
pub struct ProductEventHandler {
    fail_marker: String,
}

impl ProductEventHandler {
    pub fn new(fail_marker: impl Into<String>) -> Self {
        Self {
            fail_marker: fail_marker.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for ProductEventHandler {
    fn name(&self) -> &str {
        "product-events"
    }

    async fn handle(&self, message: &Message) -> Result<(), EventError> {
        info!(
            channel = %message.channel,
            offset = message.offset,
            payload = %message.payload,
            "Received product event"
        );

        if message.payload.contains(&self.fail_marker) {
            return Err(EventError::Processing {
                channel: message.channel.clone(),
                reason: "Simulated processing failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Logs every message and never fails.
#[derive(Debug, Clone, Default)]
pub struct AuditLogHandler;

#[async_trait]
impl MessageHandler for AuditLogHandler {
    fn name(&self) -> &str {
        "audit-log"
    }

    async fn handle(&self, message: &Message) -> Result<(), EventError> {
        info!(
            channel = %message.channel,
            payload = %message.payload,
            "Received message"
        );
        Ok(())
    }
}

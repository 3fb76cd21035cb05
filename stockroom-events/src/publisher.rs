//! Change event publisher.

use std::sync::Arc;

use stockroom_core::{ChangeEvent, StockroomResult};
use tracing::{debug, warn};

use crate::message::{headers, Message, OutboundMessage};
use crate::transport::ChannelTransport;

/// Publishes change events to one channel, keyed by product id.
#[derive(Clone)]
pub struct ChangeEventPublisher {
    transport: Arc<dyn ChannelTransport>,
    channel: String,
}

impl ChangeEventPublisher {
    pub fn new(transport: Arc<dyn ChannelTransport>, channel: impl Into<String>) -> Self {
        Self {
            transport,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Hand `event` to the transport.
    pub async fn publish(&self, event: &ChangeEvent) -> StockroomResult<Message> {
        let outbound = OutboundMessage::new(self.channel.as_str(), event.payload.as_str())
            .with_key(event.key())
            .with_header(headers::CHANGE_KIND, event.kind.as_str());
        let message = self.transport.publish(outbound).await?;
        debug!(
            channel = %message.channel,
            kind = event.kind.as_str(),
            product_id = %event.product_id,
            offset = message.offset,
            "Change event published"
        );
        Ok(message)
    }

    /// Publish, logging instead of returning a failure.
    ///
    /// Used after a mutation has already committed: the write stands
    /// whether or not the announcement goes out.
    pub async fn publish_or_log(&self, event: &ChangeEvent) -> Option<Message> {
        match self.publish(event).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(
                    channel = %self.channel,
                    kind = event.kind.as_str(),
                    product_id = %event.product_id,
                    payload = %event.payload,
                    error = %e,
                    "Failed to publish change event"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryBroker;
    use stockroom_core::ProductId;

    #[tokio::test]
    async fn test_publish_keys_by_product_id() {
        let broker = Arc::new(InMemoryBroker::default());
        let publisher = ChangeEventPublisher::new(broker.clone(), "product-topic");

        let message = publisher
            .publish(&ChangeEvent::deleted(ProductId::new(7)))
            .await
            .unwrap();

        assert_eq!(message.channel, "product-topic");
        assert_eq!(message.key.as_deref(), Some("7"));
        assert_eq!(message.payload, "Product deleted with ID: 7");
        assert_eq!(message.header(headers::CHANGE_KIND), Some("deleted"));
        assert_eq!(broker.published("product-topic").len(), 1);
    }

    #[tokio::test]
    async fn test_publish_or_log_swallows_failure() {
        let broker = Arc::new(InMemoryBroker::default());
        broker.close();
        let publisher = ChangeEventPublisher::new(broker.clone(), "product-topic");

        let event = ChangeEvent::deleted(ProductId::new(1));
        assert!(publisher.publish(&event).await.is_err());
        assert!(publisher.publish_or_log(&event).await.is_none());
    }
}

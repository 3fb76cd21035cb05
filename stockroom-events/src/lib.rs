//! Stockroom Events - Change Notification Channels
//!
//! Publishes product change events to named channels and consumes them
//! with bounded retries. Messages that keep failing are routed to the
//! channel's dead-letter companion (`<channel>.DLT`) on the same
//! partition, tagged with where they came from and why they failed.

pub mod consumer;
pub mod handler;
pub mod message;
pub mod publisher;
pub mod retry;
pub mod transport;

pub use consumer::{
    ChangeEventConsumer, ConsumerMetrics, ConsumerSnapshot, DeliveryOutcome, DeliveryState,
};
pub use handler::{AuditLogHandler, MessageHandler, ProductEventHandler};
pub use message::{dead_letter_channel, headers, Message, OutboundMessage};
pub use publisher::ChangeEventPublisher;
pub use retry::RetryPolicy;
pub use transport::{ChannelTransport, InMemoryBroker, Subscription};

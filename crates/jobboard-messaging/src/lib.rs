//! Messaging data layer: conversations and messages over the authenticated
//! gateway, with local echo for offline sends and a fixture fallback.

pub mod breaker;
pub mod cache;
pub mod error;
pub mod fixtures;
pub mod model;
pub mod service;
pub mod settings;

pub use breaker::{BreakerStatus, CircuitBreaker};
pub use error::MessagingError;
pub use model::{Conversation, Message, MessageKind, OutgoingMessage, Participant};
pub use service::{DeliveryStatus, MessagingService, SendReceipt};
pub use settings::{DataSourceMode, MessagingSettings};

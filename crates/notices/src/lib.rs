//! `amo-notices`: operator alerts and platform messages.

pub mod alert;
pub mod message;

pub use alert::{Alert, AlertStatus, AlertType};
pub use message::{Message, MessageStatus};

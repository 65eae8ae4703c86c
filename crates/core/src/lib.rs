//! `amo-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::{Entity, newest_first};
pub use error::{DomainError, DomainResult};
pub use event::DomainEvent;
pub use id::{
    ActivityId, AlertId, ApplicationId, CompanyId, LicenseId, MessageId, ReceiptId, ScanId, UserId,
};
pub use value_object::{EmailAddress, ValueObject};

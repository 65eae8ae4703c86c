//! Records with a stable identity and a creation instant.

use chrono::{DateTime, Utc};

/// A persisted record keyed by a typed id.
///
/// Ids are UUIDv7, so ordering by id follows creation order.
pub trait Entity {
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    fn created_at(&self) -> DateTime<Utc>;
}

/// Sort newest first, breaking timestamp ties by id.
pub fn newest_first<E: Entity>(items: &mut [E]) {
    items.sort_by(|a, b| (b.created_at(), *b.id()).cmp(&(a.created_at(), *a.id())));
}

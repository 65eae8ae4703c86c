//! Infrastructure layer: persistence adapters and external integrations.

pub mod memory;
pub mod postgres;
pub mod store;
pub mod sync;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{
    ActivityStore, ApplicationListing, LicenseListing, LicenseStore, NoticeStore, OwnerSummary,
    PlatformStore, ReceiptStore, ReceiptTotals, RegistryStore, StatusTransition, StoreError,
    StoreResult, UserStore,
};
pub use sync::{RemoteSync, SyncReport, UnintegratedRemote};

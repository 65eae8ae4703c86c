//! Remote data synchronization.
//!
//! No remote system is wired up yet. [`UnintegratedRemote`] reports what a sync
//! would cover and says so through `integrated: false`.

use std::time::Duration;

use serde::Serialize;

use crate::store::{PlatformStore, StoreResult};

/// Percentage of records the unintegrated remote reports as synced.
const REPORTED_SUCCESS_PERCENT: u64 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub total_records: u64,
    pub synced_records: u64,
    pub failed_records: u64,
    /// `false` until a real remote is connected.
    pub integrated: bool,
}

impl SyncReport {
    fn simulated(total_records: u64) -> Self {
        let synced_records = total_records * REPORTED_SUCCESS_PERCENT / 100;
        Self {
            total_records,
            synced_records,
            failed_records: total_records - synced_records,
            integrated: false,
        }
    }
}

#[async_trait::async_trait]
pub trait RemoteSync: Send + Sync {
    async fn synchronize(&self, store: &dyn PlatformStore) -> StoreResult<SyncReport>;
}

#[derive(Debug, Clone)]
pub struct UnintegratedRemote {
    delay: Duration,
}

impl UnintegratedRemote {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl RemoteSync for UnintegratedRemote {
    #[tracing::instrument(skip_all, err)]
    async fn synchronize(&self, store: &dyn PlatformStore) -> StoreResult<SyncReport> {
        let (users, licenses, receipts, applications, companies) = tokio::join!(
            store.count_users(),
            store.count_licenses(),
            store.count_receipts(),
            store.count_applications(),
            store.count_companies(),
        );
        let total = users? + licenses? + receipts? + applications? + companies?;

        tokio::time::sleep(self.delay).await;

        let report = SyncReport::simulated(total);
        tracing::info!(
            total = report.total_records,
            synced = report.synced_records,
            "simulated sync finished; remote not integrated"
        );
        Ok(report)
    }
}

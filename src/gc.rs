//! Garbage collection of future-dated records
//!
//! The producer occasionally writes a record with a clock-skewed timestamp
//! far in the future. Such a record would pin `latest()` forever and mask
//! real staleness, so after each evaluation the monitor checks the fetched
//! record and deletes it when its timestamp is implausible.

use crate::error::StoreError;
use crate::record::{Datapoint, Record};
use crate::store::LogStore;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use log::{error, info, warn};
use std::sync::Arc;

/// Records more than this far in the future are treated as garbage writes
pub const MAX_FUTURE_SKEW_SECONDS: i64 = 3600;

/// Detects and deletes anomalous future-dated records
pub struct GarbageCollector {
    store: Arc<dyn LogStore>,
    source_offset: FixedOffset,
}

impl GarbageCollector {
    pub fn new(store: Arc<dyn LogStore>, source_offset: FixedOffset) -> Self {
        Self {
            store,
            source_offset,
        }
    }

    /// Whether a record's normalized timestamp is implausibly far ahead of now
    ///
    /// The boundary is exclusive: a record exactly one hour ahead is kept.
    pub fn is_garbage(&self, record: &Record, now: DateTime<Utc>) -> bool {
        record.utc_time(self.source_offset) > now + Duration::seconds(MAX_FUTURE_SKEW_SECONDS)
    }

    /// Inspect the datapoint fetched this cycle and delete it if anomalous
    ///
    /// Deletion targets exactly the given datapoint by its store key, never a
    /// range. After a successful delete the latest record is re-fetched so
    /// the caller's cached view reflects the corrected store. Returns the
    /// corrected datapoint when a deletion and re-fetch both succeeded,
    /// `None` otherwise (including the common case of nothing to collect).
    pub async fn sweep(&self, datapoint: &Datapoint, now: DateTime<Utc>) -> Option<Datapoint> {
        if !self.is_garbage(&datapoint.record, now) {
            return None;
        }

        warn!(
            "record '{}' is dated {} seconds in the future, deleting",
            datapoint.key,
            (datapoint.record.utc_time(self.source_offset) - now).num_seconds()
        );

        if let Err(e) = self.store.delete(&datapoint.key).await {
            error!("failed to delete garbage record '{}': {}", datapoint.key, e);
            return None;
        }
        info!("deleted garbage record '{}'", datapoint.key);

        match self.store.latest().await {
            Ok(corrected) => Some(corrected),
            Err(StoreError::Empty) => {
                warn!("store is empty after garbage deletion");
                None
            }
            Err(e) => {
                error!("failed to re-fetch latest record after deletion: {}", e);
                None
            }
        }
    }
}

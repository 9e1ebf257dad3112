//! One evaluation cycle, end to end
//!
//! The monitor owns everything a cycle touches: the store client, the
//! notification sink, the alert flags and the cached latest datapoint. It is
//! driven by the poll scheduler and runs each cycle to completion on the
//! scheduler's thread, blocking on its own runtime for the network calls.
//! Nothing here is shared across threads, so no locking is needed for the
//! alert state or the datapoint cache.

use crate::alerts::{evaluate, reboot_message, stale_message, AlertState, CycleReport};
use crate::error::StoreError;
use crate::gc::GarbageCollector;
use crate::notify::Notifier;
use crate::record::Datapoint;
use crate::store::LogStore;
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, error, info};
use std::sync::Arc;

pub struct Monitor {
    store: Arc<dyn LogStore>,
    notifier: Arc<dyn Notifier>,
    gc: GarbageCollector,
    state: AlertState,
    /// Latest datapoint seen this process, refreshed every cycle and after
    /// a garbage deletion
    latest: Option<Datapoint>,
    threshold_minutes: i64,
    source_offset: FixedOffset,
    runtime: tokio::runtime::Runtime,
}

impl Monitor {
    /// Create a monitor over the given store and notification sink
    ///
    /// # Errors
    ///
    /// Returns an IO error if the internal runtime cannot be built, which is
    /// fatal during bootstrap.
    pub fn new(
        store: Arc<dyn LogStore>,
        notifier: Arc<dyn Notifier>,
        threshold_minutes: i64,
        source_offset: FixedOffset,
    ) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            gc: GarbageCollector::new(Arc::clone(&store), source_offset),
            store,
            notifier,
            state: AlertState::new(),
            latest: None,
            threshold_minutes,
            source_offset,
            runtime,
        })
    }

    /// Current alert flags
    ///
    /// This is primarily used for testing and monitoring.
    pub fn alert_state(&self) -> AlertState {
        self.state
    }

    /// The datapoint the last cycle ended on, post garbage collection
    ///
    /// This is primarily used for testing and monitoring.
    pub fn latest_datapoint(&self) -> Option<&Datapoint> {
        self.latest.as_ref()
    }

    /// Run one evaluation cycle to completion
    ///
    /// Network failures abort the cycle with an error log and leave the
    /// alert state untouched; the next scheduled cycle proceeds normally.
    pub fn run_cycle(&mut self) {
        let now = Utc::now();
        if let Some(report) = self.cycle(now) {
            info!(
                "{}",
                report.log_line(now.with_timezone(&self.source_offset), &self.state)
            );
        }
    }

    fn cycle(&mut self, now: DateTime<Utc>) -> Option<CycleReport> {
        let datapoint = match self.runtime.block_on(self.store.latest()) {
            Ok(datapoint) => datapoint,
            Err(StoreError::Empty) => {
                // An empty store is a broken precondition, not an infinitely
                // stale feed; skip evaluation entirely.
                error!("log store is empty; skipping evaluation");
                return None;
            }
            Err(e) => {
                error!("failed to fetch latest record: {}", e);
                return None;
            }
        };
        debug!(
            "fetched record '{}' with timestamp {}",
            datapoint.key, datapoint.record.timestamp
        );

        let report = evaluate(
            now,
            &datapoint.record,
            &mut self.state,
            self.threshold_minutes,
            self.source_offset,
        );

        if report.stale_alert_sent {
            self.dispatch(&stale_message(report.diff_minutes));
        }
        if report.reboot_alert_sent {
            self.dispatch(reboot_message());
        }

        self.latest = self
            .runtime
            .block_on(self.gc.sweep(&datapoint, now))
            .or(Some(datapoint));

        Some(report)
    }

    /// Attempt delivery of one alert message
    ///
    /// The alert flag is already set by the evaluator at this point: the
    /// dedup contract is at-most-once-attempt per fault occurrence, so a
    /// failed delivery is logged and not retried.
    fn dispatch(&self, message: &str) {
        match self.runtime.block_on(self.notifier.send(message)) {
            Ok(()) => info!("Sent notification: {}", message),
            Err(e) => error!("Failed to send notification '{}': {}", message, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::notify::MockNotifier;
    use crate::record::Record;
    use crate::store::MockLogStore;
    use mockall::Sequence;

    fn utc_offset() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    /// Timestamp `age_minutes` (and 30 extra seconds of slack against slow
    /// test runs) before the real wall clock
    fn aged_timestamp(age_minutes: i64) -> i64 {
        Utc::now().timestamp() - age_minutes * 60 - 30
    }

    fn datapoint(key: &str, timestamp: i64, reboot: bool) -> Datapoint {
        Datapoint::new(
            key,
            Record {
                timestamp,
                reboot,
                extra: serde_json::Map::new(),
            },
        )
    }

    fn expect_latest(store: &mut MockLogStore, key: &'static str, timestamp: i64, reboot: bool) {
        store.expect_latest().times(1).returning(move || {
            Box::pin(async move { Ok(datapoint(key, timestamp, reboot)) })
        });
    }

    #[test]
    fn test_stale_alert_fires_once_across_cycles() {
        let ts = aged_timestamp(41);

        let mut store = MockLogStore::new();
        store
            .expect_latest()
            .times(2)
            .returning(move || Box::pin(async move { Ok(datapoint("-A", ts, false)) }));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|msg| msg == "[ALERT] No data sent for 41 minutes")
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();
        assert!(monitor.alert_state().stale);

        // Second cycle with the same stale record: no further notification
        // (the mock would panic on an unexpected second send).
        monitor.run_cycle();
        assert!(monitor.alert_state().stale);
    }

    #[test]
    fn test_delivery_failure_still_marks_alert_active() {
        let ts = aged_timestamp(50);

        let mut store = MockLogStore::new();
        expect_latest(&mut store, "-A", ts, false);

        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_| {
            Box::pin(async { Err(NotifyError::Delivery("chat not found".to_string())) })
        });

        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();
        // At-most-once-attempt semantics: the flag is set even though
        // delivery failed, so the next cycle stays silent.
        assert!(monitor.alert_state().stale);
    }

    #[test]
    fn test_reboot_alert_fires_then_clears_on_normal_record() {
        let mut store = MockLogStore::new();
        let mut seq = Sequence::new();

        let ts1 = aged_timestamp(1);
        store
            .expect_latest()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Box::pin(async move { Ok(datapoint("-A", ts1, true)) }));
        let ts2 = aged_timestamp(0);
        store
            .expect_latest()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Box::pin(async move { Ok(datapoint("-B", ts2, false)) }));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|msg| msg == "[ALERT] Device reboot detected")
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();
        assert!(monitor.alert_state().reboot);

        monitor.run_cycle();
        assert!(!monitor.alert_state().reboot);
    }

    #[test]
    fn test_empty_store_skips_evaluation() {
        let mut store = MockLogStore::new();
        store
            .expect_latest()
            .times(1)
            .returning(|| Box::pin(async { Err(StoreError::Empty) }));

        let notifier = MockNotifier::new();
        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();
        assert_eq!(monitor.alert_state(), AlertState::new());
        assert!(monitor.latest_datapoint().is_none());
    }

    #[test]
    fn test_transient_store_failure_aborts_cycle() {
        let mut store = MockLogStore::new();
        store.expect_latest().times(1).returning(|| {
            Box::pin(async { Err(StoreError::Backend("503 unavailable".to_string())) })
        });

        let notifier = MockNotifier::new();
        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();
        assert_eq!(monitor.alert_state(), AlertState::new());
    }

    #[test]
    fn test_future_dated_record_is_collected_and_view_corrected() {
        let garbage_ts = Utc::now().timestamp() + 7200;
        let corrected_ts = aged_timestamp(2);

        let mut store = MockLogStore::new();
        let mut seq = Sequence::new();
        store
            .expect_latest()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Box::pin(async move { Ok(datapoint("-Garbage", garbage_ts, false)) }));
        store
            .expect_delete()
            .withf(|key| key == "-Garbage")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Box::pin(async { Ok(()) }));
        store
            .expect_latest()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || {
                Box::pin(async move { Ok(datapoint("-Corrected", corrected_ts, false)) })
            });

        // A future-dated record is fresher than any threshold and carries no
        // reboot flag, so no notification is expected.
        let notifier = MockNotifier::new();
        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();

        let latest = monitor.latest_datapoint().unwrap();
        assert_eq!(latest.key, "-Corrected");
        assert_eq!(latest.record.timestamp, corrected_ts);
    }

    #[test]
    fn test_healthy_cycle_caches_fetched_datapoint() {
        let ts = aged_timestamp(1);

        let mut store = MockLogStore::new();
        expect_latest(&mut store, "-Fresh", ts, false);

        let notifier = MockNotifier::new();
        let mut monitor =
            Monitor::new(Arc::new(store), Arc::new(notifier), 40, utc_offset()).unwrap();

        monitor.run_cycle();

        let latest = monitor.latest_datapoint().unwrap();
        assert_eq!(latest.key, "-Fresh");
    }
}

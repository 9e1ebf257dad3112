//! Per-cycle alert evaluation
//!
//! The evaluator is a pure function over `(now, record, state)`: it decides
//! which alerts fire this cycle, mutates the explicit [`AlertState`], and
//! returns a [`CycleReport`] for logging. Sending the decided alerts is the
//! caller's job, so a delivery failure cannot leak back into the decision
//! logic.

use crate::alerts::state::AlertState;
use crate::record::Record;
use chrono::{DateTime, FixedOffset, Utc};

/// Message for a stale-data alert
pub fn stale_message(diff_minutes: i64) -> String {
    format!("[ALERT] No data sent for {} minutes", diff_minutes)
}

/// Message for a reboot alert
pub fn reboot_message() -> &'static str {
    "[ALERT] Device reboot detected"
}

/// Structured outcome of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Whole minutes between now and the latest record, truncated toward zero
    pub diff_minutes: i64,
    /// A stale-data alert was decided (and will be attempted) this cycle
    pub stale_alert_sent: bool,
    /// A reboot alert was decided (and will be attempted) this cycle
    pub reboot_alert_sent: bool,
    /// Raw producer-local timestamp of the evaluated record
    pub record_timestamp: i64,
}

impl CycleReport {
    /// Render the per-cycle log line
    ///
    /// The clock stamp is the evaluation time in the producer's timezone,
    /// matching where the feed's operators live.
    pub fn log_line(&self, now_local: DateTime<FixedOffset>, state: &AlertState) -> String {
        let mut line = format!(
            "[{}] {}Current difference is {} minutes.",
            now_local.format("%H:%M %d/%m/%Y"),
            if state.is_alerting() { "ALERT " } else { "" },
            self.diff_minutes
        );
        if self.stale_alert_sent {
            line.push_str(" STALE ALERT SENT.");
        }
        if self.reboot_alert_sent {
            line.push_str(" REBOOT ALERT SENT.");
        }
        line
    }
}

/// Evaluate both fault conditions against the latest record
///
/// The staleness and reboot checks run independently every cycle and may
/// both fire in the same cycle. Flags are set the moment an alert is
/// decided, before any delivery attempt, so a failed send does not re-fire
/// on the next cycle.
///
/// A difference exactly equal to the threshold neither fires nor clears the
/// stale flag. The boundary is exclusive on both sides on purpose, matching
/// the behavior the feed's operators already rely on; see the pinning test
/// below before changing it.
pub fn evaluate(
    now: DateTime<Utc>,
    record: &Record,
    state: &mut AlertState,
    threshold_minutes: i64,
    source_offset: FixedOffset,
) -> CycleReport {
    let diff_minutes = (now - record.utc_time(source_offset)).num_minutes();

    let mut stale_alert_sent = false;
    if diff_minutes > threshold_minutes && !state.stale {
        state.stale = true;
        stale_alert_sent = true;
    } else if diff_minutes < threshold_minutes {
        state.stale = false;
    }

    let mut reboot_alert_sent = false;
    if record.reboot && !state.reboot {
        state.reboot = true;
        reboot_alert_sent = true;
    } else if !record.reboot {
        state.reboot = false;
    }

    CycleReport {
        diff_minutes,
        stale_alert_sent,
        reboot_alert_sent,
        record_timestamp: record.timestamp,
    }
}

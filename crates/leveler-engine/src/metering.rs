//! Meter polling.
//!
//! The loop is a fixed-cadence poll: each due tick reads the analysis tap and
//! the dynamics node's reduction from the host and folds them into a
//! [`MeterSnapshot`]. A read that fails (the tap is briefly missing while a
//! graph is rebuilt) skips that tick only.

use crate::graph::GraphId;
use crate::host::ProcessingHost;
use leveler_core::{METER_FLOOR_DB, rms_to_db};
use serde::Serialize;
use std::time::Duration;

/// One meter reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeterSnapshot {
    /// Level at the analysis tap in dB, never below `METER_FLOOR_DB`.
    pub input_level_db: f32,
    /// Level at the analysis tap in dB. The tap sits after the mix, so this
    /// matches `input_level_db`.
    pub output_level_db: f32,
    /// Attenuation in dB, zero or positive. Zero while bypassed.
    pub gain_reduction_db: f32,
}

impl Default for MeterSnapshot {
    fn default() -> Self {
        Self {
            input_level_db: METER_FLOOR_DB,
            output_level_db: METER_FLOOR_DB,
            gain_reduction_db: 0.0,
        }
    }
}

/// Cadence and scratch space for meter polling.
#[derive(Debug)]
pub struct MeteringLoop {
    interval: Duration,
    window: Vec<f32>,
    next_due: Option<Duration>,
    latest: MeterSnapshot,
}

impl MeteringLoop {
    /// Loop that reads `tap_window` samples every `interval`.
    pub fn new(interval: Duration, tap_window: usize) -> Self {
        Self {
            interval,
            window: vec![0.0; tap_window.max(1)],
            next_due: None,
            latest: MeterSnapshot::default(),
        }
    }

    /// Start ticking; the first tick is due at `now`.
    pub fn start(&mut self, now: Duration) {
        if self.next_due.is_none() {
            tracing::debug!(interval_ms = self.interval.as_millis() as u64, "metering started");
            self.next_due = Some(now);
        }
    }

    /// Stop ticking. No tick is taken after this.
    pub fn stop(&mut self) {
        if self.next_due.take().is_some() {
            tracing::debug!("metering stopped");
        }
    }

    /// Whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Most recent published snapshot.
    pub fn latest(&self) -> MeterSnapshot {
        self.latest
    }

    /// Take a reading if one is due at `now`.
    ///
    /// Returns the new snapshot, or `None` when the loop is stopped, the tick
    /// is not due yet, or the host could not serve the reads.
    pub fn tick<H: ProcessingHost + ?Sized>(
        &mut self,
        now: Duration,
        host: &H,
        graph: GraphId,
        bypass: bool,
    ) -> Option<MeterSnapshot> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        // Catch up without bursting after a stall.
        let mut next = due + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_due = Some(next);

        let snapshot = self.sample(host, graph, bypass)?;
        self.latest = snapshot;
        Some(snapshot)
    }

    /// Read the host once, ignoring cadence.
    pub fn sample<H: ProcessingHost + ?Sized>(
        &mut self,
        host: &H,
        graph: GraphId,
        bypass: bool,
    ) -> Option<MeterSnapshot> {
        let written = match host.read_time_domain(graph, &mut self.window) {
            Ok(n) => n.min(self.window.len()),
            Err(err) => {
                tracing::trace!(%err, "tap read skipped");
                return None;
            }
        };
        let reduction = if bypass {
            0.0
        } else {
            match host.read_gain_reduction(graph) {
                Ok(db) => (-db).max(0.0),
                Err(err) => {
                    tracing::trace!(%err, "gain reduction read skipped");
                    return None;
                }
            }
        };
        let level = rms_to_db(&self.window[..written]).max(METER_FLOOR_DB);
        Some(MeterSnapshot {
            input_level_db: level,
            output_level_db: level,
            gain_reduction_db: reduction,
        })
    }
}

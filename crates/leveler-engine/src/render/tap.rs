//! Analysis tap shared between the audio thread and the control side.
//!
//! The audio thread keeps its own [`TapRing`] and, once per block, copies it
//! into [`SharedMeters`] under `try_lock`. Neither side ever waits: a
//! contended publish is skipped, a contended read reports
//! [`HostError::TapUnavailable`].

use crate::error::HostError;
use crate::graph::GraphId;
use parking_lot::Mutex;

/// Fixed-size ring of the most recent samples.
#[derive(Debug, Clone)]
pub(crate) struct TapRing {
    samples: Vec<f32>,
    write: usize,
    filled: usize,
}

impl TapRing {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len.max(1)],
            write: 0,
            filled: 0,
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, sample: f32) {
        self.samples[self.write] = sample;
        self.write = (self.write + 1) % self.samples.len();
        self.filled = (self.filled + 1).min(self.samples.len());
    }

    /// Copy `other` without reallocating when the sizes match.
    fn copy_from(&mut self, other: &TapRing) {
        self.samples.clone_from(&other.samples);
        self.write = other.write;
        self.filled = other.filled;
    }

    pub(crate) fn clear(&mut self) {
        self.samples.fill(0.0);
        self.write = 0;
        self.filled = 0;
    }

    /// Copy up to `out.len()` of the newest samples into `out`, oldest
    /// first. Returns how many were copied.
    pub(crate) fn copy_newest(&self, out: &mut [f32]) -> usize {
        let len = self.samples.len();
        let n = out.len().min(self.filled);
        let start = (self.write + len - n) % len;
        for (i, slot) in out[..n].iter_mut().enumerate() {
            *slot = self.samples[(start + i) % len];
        }
        n
    }
}

#[derive(Debug)]
struct Published {
    graph: Option<GraphId>,
    window: TapRing,
    gain_reduction_db: f32,
}

/// Latest tap window and gain reduction of the active graph.
#[derive(Debug)]
pub struct SharedMeters {
    inner: Mutex<Published>,
}

impl SharedMeters {
    /// Holds `window` samples.
    pub fn new(window: usize) -> Self {
        Self {
            inner: Mutex::new(Published {
                graph: None,
                window: TapRing::new(window),
                gain_reduction_db: 0.0,
            }),
        }
    }

    /// Audio thread: publish the tap if the lock is free.
    pub(crate) fn try_publish(&self, graph: GraphId, ring: &TapRing, gain_reduction_db: f32) -> bool {
        let Some(mut published) = self.inner.try_lock() else {
            return false;
        };
        published.graph = Some(graph);
        published.window.copy_from(ring);
        published.gain_reduction_db = gain_reduction_db;
        true
    }

    /// Forget the published graph.
    pub(crate) fn clear(&self) {
        let mut published = self.inner.lock();
        published.graph = None;
        published.window.clear();
        published.gain_reduction_db = 0.0;
    }

    /// Copy the newest tap samples of `graph` into `out`.
    pub fn read_time_domain(&self, graph: GraphId, out: &mut [f32]) -> Result<usize, HostError> {
        let published = self.inner.try_lock().ok_or(HostError::TapUnavailable)?;
        if published.graph != Some(graph) {
            return Err(HostError::TapUnavailable);
        }
        Ok(published.window.copy_newest(out))
    }

    /// Gain reduction of `graph` as of the last published block.
    pub fn gain_reduction_db(&self, graph: GraphId) -> Result<f32, HostError> {
        let published = self.inner.try_lock().ok_or(HostError::TapUnavailable)?;
        if published.graph != Some(graph) {
            return Err(HostError::TapUnavailable);
        }
        Ok(published.gain_reduction_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_returns_newest_oldest_first() {
        let mut ring = TapRing::new(4);
        for s in 1..=6 {
            ring.push(s as f32);
        }
        let mut out = [0.0; 3];
        assert_eq!(ring.copy_newest(&mut out), 3);
        assert_eq!(out, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn partially_filled_ring_reports_what_it_has() {
        let mut ring = TapRing::new(8);
        ring.push(0.5);
        ring.push(0.25);
        let mut out = [9.0; 8];
        assert_eq!(ring.copy_newest(&mut out), 2);
        assert_eq!(&out[..2], &[0.5, 0.25]);
    }

    #[test]
    fn reads_are_scoped_to_the_published_graph() {
        let meters = SharedMeters::new(4);
        let mut out = [0.0; 4];
        assert!(matches!(
            meters.read_time_domain(GraphId(1), &mut out),
            Err(HostError::TapUnavailable)
        ));

        let mut ring = TapRing::new(4);
        ring.push(0.1);
        assert!(meters.try_publish(GraphId(1), &ring, -3.0));
        assert_eq!(meters.read_time_domain(GraphId(1), &mut out).unwrap(), 1);
        assert_eq!(meters.gain_reduction_db(GraphId(1)).unwrap(), -3.0);
        assert!(meters.gain_reduction_db(GraphId(2)).is_err());

        meters.clear();
        assert!(meters.gain_reduction_db(GraphId(1)).is_err());
    }

    #[test]
    fn contended_lock_skips_instead_of_waiting() {
        let meters = SharedMeters::new(4);
        let ring = TapRing::new(4);
        let _held = meters.inner.lock();
        assert!(!meters.try_publish(GraphId(1), &ring, 0.0));
    }
}

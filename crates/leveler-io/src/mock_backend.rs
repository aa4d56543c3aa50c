//! Deterministic backend driven by the caller.
//!
//! [`MockBackend`] never touches hardware. Streams built on it register their
//! callbacks in shared state; the test (or offline renderer) then pulls
//! output with [`MockBackend::pull_output`] and pushes captured audio with
//! [`MockBackend::feed_input`]. Clones share state, so one clone can be
//! handed to the engine while another drives it.
//!
//! ```rust
//! use leveler_io::{AudioBackend, BackendStreamConfig, InputPolicy, MockBackend};
//!
//! let backend = MockBackend::new(48000);
//! backend.set_input_policy(InputPolicy::Deny);
//! let result = backend.build_input_stream(
//!     &BackendStreamConfig::default(),
//!     Box::new(|_| {}),
//!     Box::new(|_| {}),
//! );
//! assert!(result.is_err());
//! assert_eq!(backend.active_inputs(), 0);
//! ```

use crate::backend::{
    AudioBackend, BackendStreamConfig, ErrorCallback, InputCallback, OutputCallback, StreamHandle,
};
use crate::{AudioDevice, Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Whether capture requests are granted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputPolicy {
    /// Capture streams open normally.
    #[default]
    Grant,
    /// Capture streams fail with [`Error::PermissionDenied`].
    Deny,
}

struct Registered<C> {
    id: u64,
    callback: C,
}

struct Shared {
    sample_rate: u32,
    channels: u16,
    policy: InputPolicy,
    next_id: u64,
    outputs: Vec<Registered<OutputCallback>>,
    inputs: Vec<Registered<InputCallback>>,
    opened_inputs: usize,
}

/// Unregisters its stream when dropped.
struct MockStream {
    id: u64,
    is_input: bool,
    shared: Arc<Mutex<Shared>>,
}

impl Drop for MockStream {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        if self.is_input {
            shared.inputs.retain(|r| r.id != self.id);
        } else {
            shared.outputs.retain(|r| r.id != self.id);
        }
        tracing::trace!(id = self.id, input = self.is_input, "mock stream released");
    }
}

/// Caller-driven audio backend.
#[derive(Clone)]
pub struct MockBackend {
    shared: Arc<Mutex<Shared>>,
}

impl MockBackend {
    /// Create a backend running at `sample_rate` with stereo output.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                sample_rate,
                channels: 2,
                policy: InputPolicy::Grant,
                next_id: 0,
                outputs: Vec::new(),
                inputs: Vec::new(),
                opened_inputs: 0,
            })),
        }
    }

    /// Grant or deny future capture requests.
    pub fn set_input_policy(&self, policy: InputPolicy) {
        self.shared.lock().policy = policy;
    }

    /// Number of live capture streams.
    pub fn active_inputs(&self) -> usize {
        self.shared.lock().inputs.len()
    }

    /// Number of live output streams.
    pub fn active_outputs(&self) -> usize {
        self.shared.lock().outputs.len()
    }

    /// Capture streams opened so far, including released ones.
    pub fn opened_inputs(&self) -> usize {
        self.shared.lock().opened_inputs
    }

    /// Deliver captured samples to every live capture stream.
    pub fn feed_input(&self, samples: &[f32]) {
        let mut shared = self.shared.lock();
        for input in &mut shared.inputs {
            (input.callback)(samples);
        }
    }

    /// Run every live output stream for `frames` frames and return the
    /// interleaved mix.
    pub fn pull_output(&self, frames: usize) -> Vec<f32> {
        let mut shared = self.shared.lock();
        let channels = usize::from(shared.channels);
        let mut mix = vec![0.0; frames * channels];
        let mut scratch = vec![0.0; frames * channels];
        for output in &mut shared.outputs {
            scratch.fill(0.0);
            (output.callback)(&mut scratch);
            for (m, s) in mix.iter_mut().zip(&scratch) {
                *m += *s;
            }
        }
        mix
    }

    fn device(&self, is_input: bool) -> AudioDevice {
        AudioDevice {
            name: if is_input { "Mock Input" } else { "Mock Output" }.to_string(),
            is_input,
            is_output: !is_input,
            default_sample_rate: self.shared.lock().sample_rate,
        }
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(vec![self.device(true), self.device(false)])
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(Some(self.device(false)))
    }

    fn default_input_device(&self) -> Result<Option<AudioDevice>> {
        Ok(Some(self.device(true)))
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        callback: OutputCallback,
        _error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let mut shared = self.shared.lock();
        shared.channels = config.channels.max(1);
        let id = shared.next_id;
        shared.next_id += 1;
        shared.outputs.push(Registered { id, callback });
        drop(shared);

        Ok(StreamHandle::new(MockStream {
            id,
            is_input: false,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn build_input_stream(
        &self,
        _config: &BackendStreamConfig,
        callback: InputCallback,
        _error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let mut shared = self.shared.lock();
        if shared.policy == InputPolicy::Deny {
            return Err(Error::PermissionDenied("mock input denied".to_string()));
        }
        let id = shared.next_id;
        shared.next_id += 1;
        shared.opened_inputs += 1;
        shared.inputs.push(Registered { id, callback });
        drop(shared);

        Ok(StreamHandle::new(MockStream {
            id,
            is_input: true,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn input_sample_rate(&self, _config: &BackendStreamConfig) -> u32 {
        self.shared.lock().sample_rate
    }
}

//! Audio I/O layer for leveler.
//!
//! This crate provides:
//!
//! - **Backends**: the [`AudioBackend`] trait with a cpal implementation for
//!   real hardware and a deterministic [`MockBackend`] for tests and offline
//!   rendering
//! - **Devices**: [`list_devices`] and [`default_device`] for enumeration
//! - **WAV codec**: file I/O plus [`encode_wav`] / [`decode_wav`] for
//!   in-memory recordings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leveler_io::{AudioBackend, BackendStreamConfig, CpalBackend};
//!
//! let backend = CpalBackend::new();
//! let stream = backend.build_output_stream(
//!     &BackendStreamConfig::default(),
//!     Box::new(|buffer: &mut [f32]| buffer.fill(0.0)),
//!     Box::new(|err| eprintln!("audio error: {err}")),
//! )?;
//! // Plays until `stream` is dropped.
//! ```

pub mod backend;
pub mod cpal_backend;
mod devices;
pub mod mock_backend;
mod wav;

pub use backend::{
    AudioBackend, BackendStreamConfig, ErrorCallback, InputCallback, OutputCallback, StreamHandle,
};
pub use cpal_backend::CpalBackend;
pub use devices::{AudioDevice, default_device, find_device_fuzzy, list_devices};
pub use mock_backend::{InputPolicy, MockBackend};
pub use wav::{WavSpec, decode_wav, encode_wav, read_wav, write_wav};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV encode/decode error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The platform refused access to the device.
    #[error("Device access denied: {0}")]
    PermissionDenied(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

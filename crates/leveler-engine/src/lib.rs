//! Leveler Engine - signal graph, sources, capture and metering
//!
//! Drives the leveling amplifier through a [`ProcessingHost`]:
//!
//! - [`LevelerEngine`] - control state in, graphs and meter snapshots out
//! - [`GraphSpec`] - the leveling topology handed to the host
//! - [`SourceProvider`] - tone, live input or looped recording
//! - [`CaptureMachine`] - the timed recording session
//! - [`MeteringLoop`] - fixed-cadence tap and gain-reduction polling
//! - [`RenderHost`] - the bundled host, rendering through a
//!   [`leveler_io::AudioBackend`]
//!
//! # Driving the engine
//!
//! The engine never spawns threads or sleeps. Call
//! [`LevelerEngine::tick`] at display rate; device grants, the recording
//! countdown and meter reads all happen there.
//!
//! ```rust
//! use leveler_core::ControlUpdate;
//! use leveler_engine::{EngineConfig, LevelerEngine, ManualClock, RenderHost};
//! use leveler_io::MockBackend;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = EngineConfig::default();
//! let backend = MockBackend::new(config.audio.sample_rate);
//! let mut host = RenderHost::new(Box::new(backend.clone()), &config.audio, 128);
//! host.start_output().unwrap();
//!
//! let clock = ManualClock::new();
//! let mut engine = LevelerEngine::with_clock(host, config, clock.clone());
//! let readings = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&readings);
//! engine.observe(move |snap| sink.lock().push(*snap));
//!
//! engine.set_control_state(ControlUpdate::power(true)).unwrap();
//! for _ in 0..30 {
//!     backend.pull_output(800);
//!     clock.advance(Duration::from_millis(17));
//!     engine.tick().unwrap();
//! }
//! let readings = readings.lock();
//! assert!(!readings.is_empty());
//! assert!(readings.iter().all(|s| s.gain_reduction_db >= 0.0));
//! ```

pub mod capture;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod metering;
pub mod render;
pub mod source;

pub use capture::{ACCESS_DENIED_MESSAGE, CaptureMachine, CaptureStatus, DECODE_FAILED_MESSAGE};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{AudioConfig, CaptureConfig, EngineConfig, MeteringConfig, default_config_path};
pub use engine::{CaptureObserver, ErrorObserver, LevelerEngine, MeterObserver};
pub use error::{ConfigError, EngineError, HostError};
pub use graph::{GraphId, GraphSpec, NodeId, NodeKind, NodeParam, SourceSpec, binding};
pub use host::{AudioBuffer, CaptureDevice, DeviceRequest, DeviceResponder, ProcessingHost};
pub use metering::{MeterSnapshot, MeteringLoop};
pub use render::{RenderGraph, RenderHost, Renderer, SharedMeters};
pub use source::{Provision, SourceProvider};

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

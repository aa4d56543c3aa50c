//! Error types for the engine, its processing host and its configuration.

use crate::graph::GraphId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the engine surfaces to the user.
///
/// None of these are fatal: each is recovered locally, published once to the
/// error observers, and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The platform refused the capture device.
    #[error("capture device access denied: {0}")]
    DeviceAccessDenied(String),

    /// Sample playback was requested before anything was recorded.
    #[error("no recording available")]
    NoRecordingAvailable,

    /// The captured audio could not be decoded.
    #[error("failed to decode recording: {0}")]
    DecodeFailure(String),

    /// The processing host could not build or activate a graph.
    #[error("failed to build signal graph: {0}")]
    GraphBuildFailure(String),
}

impl EngineError {
    /// One-line message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::DeviceAccessDenied(_) => {
                "Microphone access denied. Check your input device permissions.".to_string()
            }
            EngineError::NoRecordingAvailable => {
                "No recording yet. Record a sample before selecting it.".to_string()
            }
            EngineError::DecodeFailure(_) => "Could not decode the recording.".to_string(),
            EngineError::GraphBuildFailure(reason) => {
                format!("Could not start the audio engine: {reason}")
            }
        }
    }
}

/// Failures reported by a [`ProcessingHost`](crate::ProcessingHost).
#[derive(Debug, Error)]
pub enum HostError {
    /// The capture device was refused.
    #[error("device access denied: {0}")]
    AccessDenied(String),

    /// No usable capture device.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device request was dropped before it resolved.
    #[error("device request cancelled")]
    Cancelled,

    /// Bytes were not a decodable audio stream.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The graph description was rejected.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// No graph with this id is staged or active.
    #[error("unknown graph {0}")]
    UnknownGraph(GraphId),

    /// The node does not carry the requested parameter.
    #[error("node {node} has no {param} parameter")]
    InvalidParameter {
        /// Node index within the graph.
        node: usize,
        /// Parameter name.
        param: &'static str,
    },

    /// The analysis tap has no data for this graph right now.
    #[error("analysis tap unavailable")]
    TapUnavailable,

    /// The audio thread is gone.
    #[error("renderer disconnected")]
    Disconnected,

    /// Audio device layer error.
    #[error(transparent)]
    Io(#[from] leveler_io::Error),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn user_messages_are_single_lines() {
        let errors = [
            EngineError::DeviceAccessDenied("denied".into()),
            EngineError::NoRecordingAvailable,
            EngineError::DecodeFailure("bad header".into()),
            EngineError::GraphBuildFailure("no output".into()),
        ];
        for err in errors {
            let msg = err.user_message();
            assert!(!msg.is_empty());
            assert!(!msg.contains('\n'), "{msg}");
        }
    }

    #[test]
    fn graph_failure_message_keeps_reason() {
        let err = EngineError::GraphBuildFailure("no output device".into());
        assert!(err.user_message().contains("no output device"));
    }

    #[test]
    fn read_file_exposes_source() {
        let err = ConfigError::read_file(
            "/a/leveler.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "mock"),
        );
        assert!(err.to_string().contains("/a/leveler.toml"));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_errors_convert_into_host_errors() {
        let err: HostError = leveler_io::Error::NoDevice.into();
        assert!(matches!(err, HostError::Io(_)));
    }
}

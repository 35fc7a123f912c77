// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera manager

use crate::profiles::CameraId;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error returned by the binary's entry points
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Start(#[from] StartFailure),
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),
    #[error("GStreamer initialization failed: {0}")]
    Gstreamer(#[from] gstreamer::glib::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

/// Failure of a single pipeline operation or start attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The description could not be parsed or instantiated
    #[error("failed to launch pipeline: {0}")]
    Launch(String),
    /// `set_state` was rejected outright
    #[error("unable to set pipeline to {target}: {detail}")]
    StateChange { target: String, detail: String },
    /// The driver posted an error on the bus
    #[error("hardware error: {0}")]
    Hardware(String),
    /// The pipeline never settled into a usable state
    #[error("pipeline stuck in {current} (pending: {pending}), expected PLAYING")]
    Stuck { current: String, pending: String },
    /// A required element is missing from the pipeline
    #[error("pipeline has no element named '{0}'")]
    MissingElement(String),
}

/// Terminal startup failure after the retry policy is exhausted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{camera} camera failed to start after {attempts} attempts: {last_error}")]
pub struct StartFailure {
    pub camera: CameraId,
    pub attempts: u32,
    pub last_error: PipelineError,
}

/// On-demand reader errors
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("GStreamer error: {0}")]
    Gstreamer(#[from] gstreamer::glib::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("reader has been released")]
    Released,
    #[error("sample is missing {0}")]
    MalformedSample(&'static str),
    #[error("unsupported frame layout: {0}")]
    Layout(String),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Media controller reset errors
#[derive(Debug, thiserror::Error)]
pub enum MediaCtlError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_failure_message() {
        let failure = StartFailure {
            camera: CameraId::Rear,
            attempts: 3,
            last_error: PipelineError::Hardware("Device busy".into()),
        };
        assert_eq!(
            failure.to_string(),
            "rear camera failed to start after 3 attempts: hardware error: Device busy"
        );
    }

    #[test]
    fn test_app_error_from_str() {
        let err: AppError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}

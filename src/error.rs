//! Error types for the hardware adapters
//!
//! Driver seams return `HwError`; the adapters log and swallow them so
//! nothing crosses into the host runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by the audio or MIDI driver layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    #[error("audio driver initialization failed: {0}")]
    AudioInit(String),

    #[error("MIDI driver initialization failed: {0}")]
    MidiInit(String),

    #[error("no default input device")]
    NoDefaultInputDevice,

    #[error("failed to open input stream: {0}")]
    StreamOpen(String),

    #[error("failed to start input stream: {0}")]
    StreamStart(String),

    #[error("MIDI port {index} out of range ({count} available)")]
    PortOutOfRange { index: usize, count: usize },

    #[error("failed to open MIDI port {index}: {reason}")]
    PortOpen { index: usize, reason: String },

    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

/// An error raised by a host callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("{0}")]
    Raised(String),
}

impl CallbackError {
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }
}

/// Failure to read the hardware config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read hardware config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse hardware config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, HwError>;

//! Audio module - handles microphone capture
//!
//! This module provides:
//! - Driver seam over cpal (`AudioBackend`, `InputStream`)
//! - Block assembly into fixed 512-sample blocks
//! - The capture adapter that hands blocks to the host

mod backend;
mod block;
mod capture;
#[cfg(test)]
pub(crate) mod fake;

// Re-export public types
pub use backend::{
    AudioBackend, CpalBackend, DeviceInfo, InputHandler, InputStream, StreamParams,
    CAPTURE_PARAMS,
};
pub use block::BlockAssembler;
pub use capture::{AudioCapture, SampleCallback};

//! chordcoach-hw - hardware layer for the ChordCoach practice app
//!
//! Two independent adapters bridge realtime driver threads to a host
//! runtime that serializes its own execution behind a global lock:
//!
//! - [`AudioCapture`]: mono 16 kHz microphone capture over cpal, delivered
//!   as 512-sample `f32` blocks
//! - [`MidiBridge`]: paired MIDI input/output over midir, delivering
//!   (delta seconds, bytes) for each incoming message
//!
//! Host callbacks run under an [`ExecutionLock`]. Errors and panics they
//! produce are logged at the boundary and never reach the driver.
//!
//! With the `python` feature the crate builds the `chordcoach_hw`
//! extension module, using the GIL as the execution lock.

pub mod audio;
pub mod config;
pub mod error;
pub mod host;
pub mod midi;
#[cfg(any(feature = "python", feature = "python-tests"))]
mod python;
#[cfg(test)]
mod testing;

pub use audio::AudioCapture;
pub use config::HardwareConfig;
pub use error::{CallbackError, ConfigError, HwError};
pub use host::{ExecutionLock, GlobalLock};
pub use midi::MidiBridge;

/// Install env_logger, defaulting to the configured filter when
/// `RUST_LOG` is unset. Safe to call more than once.
pub fn init_logging(config: &HardwareConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Load the config from `CHORDCOACH_HW_CONFIG` and install logging.
///
/// Falls back to defaults if the file cannot be used. The outcome is
/// logged once the logger is installed, so a bad file is never silent.
pub fn init_from_env() -> HardwareConfig {
    let loaded = HardwareConfig::from_env();
    let config = match &loaded {
        Ok(Some((_, config))) => config.clone(),
        _ => HardwareConfig::default(),
    };
    init_logging(&config);

    match loaded {
        Ok(Some((path, _))) => log::info!("Loaded hardware config from {}", path.display()),
        Ok(None) => log::debug!("{} not set, using default hardware config", config::CONFIG_ENV),
        Err(e) => log::warn!("{}, using defaults", e),
    }
    config
}

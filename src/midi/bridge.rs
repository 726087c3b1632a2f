//! MIDI bridge adapter
//!
//! Pairs one MIDI input with one MIDI output. Incoming messages go to a
//! host callback under the host's execution lock; outgoing bytes go
//! straight to the driver. Errors are logged, never raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::backend::{MidiBackend, MidiInputHandler, MidirBackend, PortState};
use crate::config::HardwareConfig;
use crate::error::{CallbackError, Result};
use crate::host::{self, CallbackSlot, ExecutionLock};

/// Host callback receiving (delta seconds, message bytes)
pub type MessageCallback =
    dyn Fn(f64, Vec<u8>) -> std::result::Result<(), CallbackError> + Send + Sync;

#[derive(Clone, Copy)]
enum Side {
    Input,
    Output,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Side::Input => "Input",
            Side::Output => "Output",
        }
    }
}

/// MIDI input/output adapter
pub struct MidiBridge {
    /// Initialized driver (None if initialization failed)
    driver: Option<Box<dyn MidiBackend>>,

    /// Host callback, shared with the MIDI thread
    callback: Arc<CallbackSlot<MessageCallback>>,

    /// Cleared when the bridge closes
    live: Arc<AtomicBool>,
}

impl MidiBridge {
    /// Create a bridge on midir using the configured client name
    pub fn new(config: &HardwareConfig, lock: Arc<dyn ExecutionLock>) -> Self {
        let client_name = config.midi_client_name.clone();
        Self::from_driver(
            move |handler| {
                MidirBackend::new(&client_name, handler).map(|b| Box::new(b) as Box<dyn MidiBackend>)
            },
            lock,
        )
    }

    /// Create a bridge from a driver factory
    ///
    /// The factory receives the input trampoline; it is wired in once,
    /// here, and reaches whatever host callback is installed later.
    pub fn from_driver<F>(connect: F, lock: Arc<dyn ExecutionLock>) -> Self
    where
        F: FnOnce(MidiInputHandler) -> Result<Box<dyn MidiBackend>>,
    {
        let callback = Arc::new(CallbackSlot::new());
        let live = Arc::new(AtomicBool::new(true));
        let handler = trampoline(Arc::clone(&callback), Arc::clone(&live), lock);

        let driver = match connect(handler) {
            Ok(driver) => {
                log::info!(
                    "MIDI bridge initialized ({} inputs, {} outputs)",
                    driver.input_port_names().len(),
                    driver.output_port_names().len()
                );
                Some(driver)
            }
            Err(e) => {
                log::error!("MIDI driver initialization error: {}", e);
                live.store(false, Ordering::Release);
                None
            }
        };

        Self {
            driver,
            callback,
            live,
        }
    }

    /// Open input and output on `index`, each side independently
    ///
    /// A side whose port count is `index` or less is skipped silently.
    pub fn open_port(&mut self, index: usize) {
        let Some(driver) = self.driver.as_mut() else {
            log::warn!("MIDI driver not initialized, cannot open port {}", index);
            return;
        };
        open_side(driver.as_mut(), Side::Input, index);
        open_side(driver.as_mut(), Side::Output, index);
    }

    /// Send raw bytes if the output side is open; dropped otherwise
    pub fn send_message(&mut self, message: &[u8]) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        if !driver.output_state().is_open() {
            return;
        }
        if let Err(e) = driver.send(message) {
            log::warn!("MIDI send error: {}", e);
        }
    }

    /// Input port names, index-aligned with `open_port`
    pub fn port_names(&self) -> Vec<String> {
        self.driver
            .as_ref()
            .map(|d| d.input_port_names())
            .unwrap_or_default()
    }

    pub fn output_port_names(&self) -> Vec<String> {
        self.driver
            .as_ref()
            .map(|d| d.output_port_names())
            .unwrap_or_default()
    }

    /// Install the host callback, replacing any previous one
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(f64, Vec<u8>) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback.set(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        self.callback.clear();
    }

    pub fn input_state(&self) -> PortState {
        self.driver
            .as_ref()
            .map_or(PortState::Unopened, |d| d.input_state())
    }

    pub fn output_state(&self) -> PortState {
        self.driver
            .as_ref()
            .map_or(PortState::Unopened, |d| d.output_state())
    }

    pub fn is_initialized(&self) -> bool {
        self.driver.is_some()
    }

    /// Release both ports. Nothing reaches the host afterwards.
    pub fn close(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(driver) = self.driver.as_mut() {
            if driver.input_state() != PortState::Closed {
                driver.close();
                log::debug!("MIDI ports released");
            }
        }
    }
}

impl Drop for MidiBridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_side(driver: &mut dyn MidiBackend, side: Side, index: usize) {
    let state = match side {
        Side::Input => driver.input_state(),
        Side::Output => driver.output_state(),
    };
    match state {
        PortState::Unopened => {}
        PortState::Open { index: current, name } => {
            log::warn!(
                "MIDI {} already open on port {} ({}), ignoring open of port {}",
                side.label().to_lowercase(),
                current,
                name,
                index
            );
            return;
        }
        PortState::Closed => return,
    }

    // Only an unopened side pays for a port scan
    let count = match side {
        Side::Input => driver.input_port_names().len(),
        Side::Output => driver.output_port_names().len(),
    };
    if index >= count {
        return;
    }

    let result = match side {
        Side::Input => driver.open_input(index),
        Side::Output => driver.open_output(index),
    };
    match result {
        Ok(name) => log::info!("Opened MIDI {} port: {}", side.label(), name),
        Err(e) => log::error!("MIDI {} open error: {}", side.label().to_lowercase(), e),
    }
}

/// Build the MIDI-thread callback
fn trampoline(
    callback: Arc<CallbackSlot<MessageCallback>>,
    live: Arc<AtomicBool>,
    lock: Arc<dyn ExecutionLock>,
) -> MidiInputHandler {
    Arc::new(move |delta: f64, message: &[u8]| {
        if message.is_empty() || !live.load(Ordering::Acquire) {
            return;
        }
        let Some(host_callback) = callback.get() else {
            return;
        };
        let bytes = message.to_vec();
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        host::deliver(lock.as_ref(), &live, "MIDI", move || host_callback(delta, bytes));
    })
}

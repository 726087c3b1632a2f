//! Test driver standing in for cpal
//!
//! `FakeAudioDriver` is shared between the test and the backend handed to
//! `AudioCapture`. `feed` plays the role of the driver's audio thread.

use std::sync::{Arc, Mutex, PoisonError};

use super::backend::{AudioBackend, DeviceInfo, InputHandler, InputStream, StreamParams};
use crate::error::{HwError, Result};

#[derive(Default)]
struct FakeState {
    device: Option<String>,
    fail_open: Option<String>,
    fail_start: Option<String>,
    handler: Option<InputHandler>,
    running: bool,
    opened: usize,
    closed: usize,
    last_params: Option<StreamParams>,
}

#[derive(Default)]
pub(crate) struct FakeAudioDriver {
    state: Mutex<FakeState>,
}

impl FakeAudioDriver {
    pub fn with_device(name: &str) -> Arc<Self> {
        let driver = Self::default();
        driver.lock().device = Some(name.to_string());
        Arc::new(driver)
    }

    pub fn without_device() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_open(&self, reason: &str) {
        self.lock().fail_open = Some(reason.to_string());
    }

    pub fn fail_start(&self, reason: &str) {
        self.lock().fail_start = Some(reason.to_string());
    }

    pub fn backend(self: &Arc<Self>) -> Box<dyn AudioBackend> {
        Box::new(FakeAudioBackend(Arc::clone(self)))
    }

    /// Deliver one driver buffer. Returns false when no stream is running.
    ///
    /// Holds the driver state for the duration of the callback, so a
    /// concurrent `close` waits for it the way a real driver joins its
    /// audio thread.
    pub fn feed(&self, data: &[f32]) -> bool {
        let mut state = self.lock();
        if !state.running {
            return false;
        }
        match state.handler.as_mut() {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn last_params(&self) -> Option<StreamParams> {
        self.lock().last_params
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct FakeAudioBackend(Arc<FakeAudioDriver>);

impl AudioBackend for FakeAudioBackend {
    fn name(&self) -> String {
        "fake".to_string()
    }

    fn default_input_device(&self) -> Option<DeviceInfo> {
        self.0
            .lock()
            .device
            .clone()
            .map(|name| DeviceInfo { name })
    }

    fn open_input_stream(
        &mut self,
        _device: &DeviceInfo,
        params: &StreamParams,
        handler: InputHandler,
    ) -> Result<Box<dyn InputStream>> {
        let mut state = self.0.lock();
        if let Some(reason) = state.fail_open.clone() {
            return Err(HwError::StreamOpen(reason));
        }
        state.opened += 1;
        state.handler = Some(handler);
        state.last_params = Some(*params);
        Ok(Box::new(FakeStream(Arc::clone(&self.0))))
    }
}

struct FakeStream(Arc<FakeAudioDriver>);

impl InputStream for FakeStream {
    fn start(&mut self) -> Result<()> {
        let mut state = self.0.lock();
        if let Some(reason) = state.fail_start.clone() {
            return Err(HwError::StreamStart(reason));
        }
        state.running = true;
        Ok(())
    }

    fn close(self: Box<Self>) {
        let mut state = self.0.lock();
        state.running = false;
        state.handler = None;
        state.closed += 1;
    }
}

//! Audio capture adapter
//!
//! Opens one mono input stream on the default input device and hands
//! every 512-sample block to a host callback, under the host's execution
//! lock. Driver and host errors are logged and never propagate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::backend::{
    AudioBackend, CpalBackend, InputHandler, InputStream, StreamParams, CAPTURE_PARAMS,
};
use super::block::BlockAssembler;
use crate::error::{CallbackError, Result};
use crate::host::{self, CallbackSlot, ExecutionLock};

/// Host callback receiving one block of samples
pub type SampleCallback = dyn Fn(Vec<f32>) -> std::result::Result<(), CallbackError> + Send + Sync;

/// Audio capture adapter
///
/// The driver is initialized on construction and terminated on drop.
/// Dropping a capturing adapter stops the stream first.
pub struct AudioCapture {
    /// Initialized driver (None if initialization failed)
    driver: Option<Box<dyn AudioBackend>>,

    /// The open stream, present only while capturing
    stream: Option<Box<dyn InputStream>>,

    /// Host callback, shared with the audio thread
    callback: Arc<CallbackSlot<SampleCallback>>,

    /// Cleared before the stream is closed; the audio thread checks it
    /// again under the host lock
    active: Arc<AtomicBool>,

    /// Host execution lock
    lock: Arc<dyn ExecutionLock>,

    params: StreamParams,
}

impl AudioCapture {
    /// Create an adapter on the platform's default cpal host
    pub fn new(lock: Arc<dyn ExecutionLock>) -> Self {
        let driver = CpalBackend::new().map(|b| Box::new(b) as Box<dyn AudioBackend>);
        Self::from_driver(driver, lock)
    }

    /// Create an adapter from an already-initialized (or failed) driver
    ///
    /// A failed driver leaves the adapter inert: every start logs and
    /// returns.
    pub fn from_driver(driver: Result<Box<dyn AudioBackend>>, lock: Arc<dyn ExecutionLock>) -> Self {
        let driver = match driver {
            Ok(driver) => {
                log::info!("Audio capture initialized with {}", driver.name());
                Some(driver)
            }
            Err(e) => {
                log::error!("Audio driver initialization error: {}", e);
                None
            }
        };

        Self {
            driver,
            stream: None,
            callback: Arc::new(CallbackSlot::new()),
            active: Arc::new(AtomicBool::new(false)),
            lock,
            params: CAPTURE_PARAMS,
        }
    }

    /// Install the host callback, replacing any previous one
    ///
    /// Takes effect from the next block delivered.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(Vec<f32>) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback.set(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        self.callback.clear();
    }

    /// Start capturing from the default input device
    ///
    /// A second call while capturing only logs.
    pub fn start_capture(&mut self) {
        if self.stream.is_some() {
            log::info!("Audio capture already running");
            return;
        }

        let Some(driver) = self.driver.as_mut() else {
            log::error!("Audio driver not initialized, cannot start capture");
            return;
        };

        let Some(device) = driver.default_input_device() else {
            log::error!("No default input device");
            return;
        };
        log::info!("Using input device: {}", device.name);

        let handler = trampoline(
            self.params.frames_per_buffer as usize,
            Arc::clone(&self.callback),
            Arc::clone(&self.active),
            Arc::clone(&self.lock),
        );

        self.active.store(true, Ordering::Release);

        let mut stream = match driver.open_input_stream(&device, &self.params, handler) {
            Ok(stream) => stream,
            Err(e) => {
                self.active.store(false, Ordering::Release);
                log::error!("Audio open stream error: {}", e);
                return;
            }
        };

        if let Err(e) = stream.start() {
            self.active.store(false, Ordering::Release);
            log::error!("Audio start stream error: {}", e);
            stream.close();
            return;
        }

        self.stream = Some(stream);
        log::info!("Started audio capture");
    }

    /// Stop capturing
    ///
    /// No host callback runs after this returns. No-op when idle.
    pub fn stop_capture(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.active.store(false, Ordering::Release);
            stream.close();
            log::info!("Stopped audio capture");
        }
    }

    /// Check if a stream is open
    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the driver came up
    pub fn is_initialized(&self) -> bool {
        self.driver.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop_capture();
        if self.driver.take().is_some() {
            log::debug!("Audio driver terminated");
        }
    }
}

/// Build the audio-thread callback
///
/// Re-blocks driver buffers, copies each full block and delivers it
/// under the host lock. Blocks arriving with no host callback installed
/// are dropped.
fn trampoline(
    block_len: usize,
    callback: Arc<CallbackSlot<SampleCallback>>,
    active: Arc<AtomicBool>,
    lock: Arc<dyn ExecutionLock>,
) -> InputHandler {
    let mut blocks = BlockAssembler::new(block_len);

    Box::new(move |data: &[f32]| {
        blocks.push(data, |block| {
            if !active.load(Ordering::Acquire) {
                return;
            }
            let Some(host_callback) = callback.get() else {
                return;
            };
            let samples = block.to_vec();
            host::deliver(lock.as_ref(), &active, "audio", move || host_callback(samples));
        });
    })
}

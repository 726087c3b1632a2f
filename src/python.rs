//! Python bindings: the `chordcoach_hw` extension module
//!
//! Registers `AudioHandler` and `MidiHandler`. The GIL is the execution
//! lock. Anything that may wait on a driver thread (stopping a stream,
//! opening or releasing ports) runs with the GIL released, because that
//! thread may itself be waiting for the GIL to deliver a callback.
//!
//! The `python-tests` feature embeds an interpreter so `cargo test` can
//! drive these classes without building the extension module.

use std::sync::{Arc, OnceLock};

use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;

use crate::{AudioCapture, CallbackError, ExecutionLock, HardwareConfig, MidiBridge};

/// Config for the extension module, read once on first use
static CONFIG: OnceLock<HardwareConfig> = OnceLock::new();

fn config() -> &'static HardwareConfig {
    CONFIG.get_or_init(crate::init_from_env)
}

/// The GIL as an `ExecutionLock`
struct Gil;

impl ExecutionLock for Gil {
    fn run_locked(&self, f: &mut dyn FnMut()) {
        Python::with_gil(|_py| f());
    }
}

fn callable(callback: &Bound<'_, PyAny>) -> PyResult<PyObject> {
    if !callback.is_callable() {
        return Err(PyTypeError::new_err("callback must be callable"));
    }
    Ok(callback.clone().unbind())
}

fn raised(err: PyErr) -> CallbackError {
    CallbackError::raised(err.to_string())
}

#[pyclass(name = "AudioHandler", module = "chordcoach_hw")]
struct PyAudioHandler {
    inner: AudioCapture,
}

#[pymethods]
impl PyAudioHandler {
    #[new]
    fn new() -> Self {
        Self {
            inner: AudioCapture::new(Arc::new(Gil)),
        }
    }

    #[pyo3(name = "startCapture")]
    fn start_capture(&mut self, py: Python<'_>) {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.start_capture());
    }

    #[pyo3(name = "stopCapture")]
    fn stop_capture(&mut self, py: Python<'_>) {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.stop_capture());
    }

    /// Install `callback(samples: list[float])`; `None` removes it.
    #[pyo3(name = "setCallback")]
    fn set_callback(&self, callback: Option<Bound<'_, PyAny>>) -> PyResult<()> {
        let Some(callback) = callback else {
            self.inner.clear_callback();
            return Ok(());
        };
        let callback = callable(&callback)?;
        self.inner.set_callback(move |samples: Vec<f32>| {
            Python::with_gil(|py| callback.call1(py, (samples,)).map(drop).map_err(raised))
        });
        Ok(())
    }
}

impl Drop for PyAudioHandler {
    fn drop(&mut self) {
        let inner = &mut self.inner;
        Python::with_gil(|py| py.allow_threads(|| inner.stop_capture()));
    }
}

#[pyclass(name = "MidiHandler", module = "chordcoach_hw")]
struct PyMidiHandler {
    inner: MidiBridge,
}

#[pymethods]
impl PyMidiHandler {
    #[new]
    fn new() -> Self {
        Self {
            inner: MidiBridge::new(config(), Arc::new(Gil)),
        }
    }

    /// Negative indices are skipped like out-of-range ones.
    #[pyo3(name = "openPort")]
    fn open_port(&mut self, py: Python<'_>, port: i64) {
        let Ok(index) = usize::try_from(port) else {
            return;
        };
        let inner = &mut self.inner;
        py.allow_threads(|| inner.open_port(index));
    }

    #[pyo3(name = "sendMessage")]
    fn send_message(&mut self, message: Vec<u8>) {
        self.inner.send_message(&message);
    }

    #[pyo3(name = "getPortNames")]
    fn get_port_names(&self) -> Vec<String> {
        self.inner.port_names()
    }

    /// Install `callback(deltatime: float, message: list[int])`; `None`
    /// removes it.
    #[pyo3(name = "setCallback")]
    fn set_callback(&self, callback: Option<Bound<'_, PyAny>>) -> PyResult<()> {
        let Some(callback) = callback else {
            self.inner.clear_callback();
            return Ok(());
        };
        let callback = callable(&callback)?;
        self.inner.set_callback(move |delta: f64, bytes: Vec<u8>| {
            Python::with_gil(|py| callback.call1(py, (delta, bytes)).map(drop).map_err(raised))
        });
        Ok(())
    }
}

impl Drop for PyMidiHandler {
    fn drop(&mut self) {
        let inner = &mut self.inner;
        Python::with_gil(|py| py.allow_threads(|| inner.close()));
    }
}

#[pymodule]
#[pyo3(name = "chordcoach_hw")]
fn chordcoach_hw_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    config();
    m.add("__doc__", "ChordCoach hardware layer: audio capture and MIDI adapters")?;
    m.add_class::<PyMidiHandler>()?;
    m.add_class::<PyAudioHandler>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeAudioDriver;
    use crate::midi::fake::FakeMidiDriver;
    use crate::midi::PortState;
    use pyo3::types::PyList;
    use std::thread;
    use std::time::Duration;

    fn audio_handler<'py>(py: Python<'py>, driver: &Arc<FakeAudioDriver>) -> Bound<'py, PyAudioHandler> {
        let inner = AudioCapture::from_driver(Ok(driver.backend()), Arc::new(Gil));
        Bound::new(py, PyAudioHandler { inner }).unwrap()
    }

    fn midi_handler<'py>(py: Python<'py>, driver: &Arc<FakeMidiDriver>) -> Bound<'py, PyMidiHandler> {
        let driver = Arc::clone(driver);
        let inner = MidiBridge::from_driver(move |handler| driver.connect(handler), Arc::new(Gil));
        Bound::new(py, PyMidiHandler { inner }).unwrap()
    }

    #[test]
    fn test_stop_while_block_waits_for_gil() {
        let driver = FakeAudioDriver::with_device("Built-in Microphone");
        Python::with_gil(|py| {
            let handler = audio_handler(py, &driver);
            let seen = PyList::empty_bound(py);
            handler
                .call_method1("setCallback", (seen.getattr("append").unwrap(),))
                .unwrap();
            handler.call_method0("startCapture").unwrap();
            assert!(driver.is_running());

            // The audio thread takes a block and then waits on the GIL held here
            let feeder = Arc::clone(&driver);
            let audio_thread = thread::spawn(move || feeder.feed(&[0.25; 512]));
            thread::sleep(Duration::from_millis(50));

            handler.call_method0("stopCapture").unwrap();
            assert!(!driver.is_running());
            assert_eq!(driver.closed(), 1);

            py.allow_threads(|| audio_thread.join()).unwrap();
            assert_eq!(seen.len(), 0);
        });
    }

    #[test]
    fn test_drop_while_block_waits_for_gil() {
        let driver = FakeAudioDriver::with_device("Built-in Microphone");
        Python::with_gil(|py| {
            let handler = audio_handler(py, &driver);
            let seen = PyList::empty_bound(py);
            handler
                .call_method1("setCallback", (seen.getattr("append").unwrap(),))
                .unwrap();
            handler.call_method0("startCapture").unwrap();

            let feeder = Arc::clone(&driver);
            let audio_thread = thread::spawn(move || feeder.feed(&[0.25; 512]));
            thread::sleep(Duration::from_millis(50));

            drop(handler);
            assert!(!driver.is_running());

            py.allow_threads(|| audio_thread.join()).unwrap();
            assert_eq!(seen.len(), 0);
        });
    }

    #[test]
    fn test_audio_blocks_reach_python() {
        let driver = FakeAudioDriver::with_device("Built-in Microphone");
        Python::with_gil(|py| {
            let handler = audio_handler(py, &driver);
            let seen = PyList::empty_bound(py);
            handler
                .call_method1("setCallback", (seen.getattr("append").unwrap(),))
                .unwrap();
            handler.call_method0("startCapture").unwrap();

            assert!(driver.feed(&[0.5; 512]));
            assert_eq!(seen.len(), 1);
            let block: Vec<f32> = seen.get_item(0).unwrap().extract().unwrap();
            assert_eq!(block, vec![0.5; 512]);

            handler.call_method0("stopCapture").unwrap();
        });
    }

    #[test]
    fn test_negative_port_leaves_both_sides_unopened() {
        let driver = FakeMidiDriver::new(&["Piano In"], &["Piano Out"]);
        Python::with_gil(|py| {
            let handler = midi_handler(py, &driver);
            handler.call_method1("openPort", (-1,)).unwrap();
            assert_eq!(handler.borrow().inner.input_state(), PortState::Unopened);
            assert_eq!(handler.borrow().inner.output_state(), PortState::Unopened);

            handler.call_method1("openPort", (0,)).unwrap();
            assert!(handler.borrow().inner.input_state().is_open());
            assert!(handler.borrow().inner.output_state().is_open());
        });
    }

    #[test]
    fn test_clearing_callback_stops_delivery() {
        let driver = FakeMidiDriver::new(&["Piano In"], &[]);
        Python::with_gil(|py| {
            let handler = midi_handler(py, &driver);
            handler.call_method1("openPort", (0,)).unwrap();

            let seen = PyList::empty_bound(py);
            handler
                .call_method1("setCallback", (seen.getattr("append").unwrap(),))
                .unwrap();
            assert!(driver.inject(0, &[0x90, 0x3C, 0x7F]));
            assert_eq!(seen.len(), 1);

            handler.call_method1("setCallback", (py.None(),)).unwrap();
            assert!(driver.inject(10, &[0x80, 0x3C, 0x00]));
            assert_eq!(seen.len(), 1);
        });
    }

    #[test]
    fn test_non_callable_is_type_error() {
        let driver = FakeMidiDriver::new(&["Piano In"], &[]);
        Python::with_gil(|py| {
            let midi = midi_handler(py, &driver);
            let err = midi.call_method1("setCallback", (5,)).unwrap_err();
            assert!(err.is_instance_of::<PyTypeError>(py));

            let audio = audio_handler(py, &FakeAudioDriver::with_device("Mic"));
            let err = audio.call_method1("setCallback", ("not a function",)).unwrap_err();
            assert!(err.is_instance_of::<PyTypeError>(py));
        });
    }
}

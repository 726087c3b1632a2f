//! Test driver standing in for midir

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::{MidiBackend, MidiInputHandler, PortState};
use super::message::DeltaClock;
use crate::error::{HwError, Result};

struct FakeState {
    inputs: Vec<String>,
    outputs: Vec<String>,
    input: PortState,
    output: PortState,
    clock: DeltaClock,
    handler: Option<MidiInputHandler>,
    sent: Vec<Vec<u8>>,
    input_opens: usize,
    name_queries: usize,
}

pub(crate) struct FakeMidiDriver {
    state: Mutex<FakeState>,
}

impl FakeMidiDriver {
    pub fn new(inputs: &[&str], outputs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                input: PortState::Unopened,
                output: PortState::Unopened,
                clock: DeltaClock::new(),
                handler: None,
                sent: Vec::new(),
                input_opens: 0,
                name_queries: 0,
            }),
        })
    }

    /// Factory for `MidiBridge::from_driver`
    pub fn connect(self: &Arc<Self>, handler: MidiInputHandler) -> Result<Box<dyn MidiBackend>> {
        self.lock().handler = Some(handler);
        Ok(Box::new(FakeMidiBackend(Arc::clone(self))))
    }

    /// Simulate a message arriving on the open input port at `stamp_us`.
    /// Returns false if the input side is not open.
    pub fn inject(&self, stamp_us: u64, bytes: &[u8]) -> bool {
        let (handler, delta) = {
            let mut state = self.lock();
            if !state.input.is_open() {
                return false;
            }
            let Some(handler) = state.handler.clone() else {
                return false;
            };
            (handler, state.clock.delta(stamp_us))
        };
        handler(delta, bytes);
        true
    }

    pub fn add_input(&self, name: &str) {
        self.lock().inputs.push(name.to_string());
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    pub fn input_opens(&self) -> usize {
        self.lock().input_opens
    }

    /// Number of port name listings requested, input and output
    pub fn name_queries(&self) -> usize {
        self.lock().name_queries
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct FakeMidiBackend(Arc<FakeMidiDriver>);

impl MidiBackend for FakeMidiBackend {
    fn input_port_names(&self) -> Vec<String> {
        let mut state = self.0.lock();
        state.name_queries += 1;
        state.inputs.clone()
    }

    fn output_port_names(&self) -> Vec<String> {
        let mut state = self.0.lock();
        state.name_queries += 1;
        state.outputs.clone()
    }

    fn open_input(&mut self, index: usize) -> Result<String> {
        let mut state = self.0.lock();
        let name = state
            .inputs
            .get(index)
            .cloned()
            .ok_or(HwError::PortOutOfRange { index, count: state.inputs.len() })?;
        state.input = PortState::Open { index, name: name.clone() };
        state.clock = DeltaClock::new();
        state.input_opens += 1;
        Ok(name)
    }

    fn open_output(&mut self, index: usize) -> Result<String> {
        let mut state = self.0.lock();
        let name = state
            .outputs
            .get(index)
            .cloned()
            .ok_or(HwError::PortOutOfRange { index, count: state.outputs.len() })?;
        state.output = PortState::Open { index, name: name.clone() };
        Ok(name)
    }

    fn input_state(&self) -> PortState {
        self.0.lock().input.clone()
    }

    fn output_state(&self) -> PortState {
        self.0.lock().output.clone()
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        let mut state = self.0.lock();
        if state.output.is_open() {
            state.sent.push(message.to_vec());
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.0.lock();
        state.input = PortState::Closed;
        state.output = PortState::Closed;
    }
}

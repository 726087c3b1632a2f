//! MIDI driver seam
//!
//! `MidiBackend` owns one input side and one output side. The input
//! handler is given to the driver when it is created, so every input
//! connection made later calls the same handler.

use std::sync::Arc;

use midir::{
    Ignore, MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection,
};

use super::message::DeltaClock;
use crate::error::{HwError, Result};

/// Input handler called on the driver's MIDI thread with
/// (delta seconds, message bytes).
pub type MidiInputHandler = Arc<dyn Fn(f64, &[u8]) + Send + Sync>;

/// State of one side (input or output) of the port pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortState {
    Unopened,
    Open { index: usize, name: String },
    Closed,
}

impl PortState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// An initialized MIDI driver
pub trait MidiBackend: Send {
    fn input_port_names(&self) -> Vec<String>;
    fn output_port_names(&self) -> Vec<String>;

    /// Connect the input side to port `index`, returning its name
    fn open_input(&mut self, index: usize) -> Result<String>;

    /// Connect the output side to port `index`, returning its name
    fn open_output(&mut self, index: usize) -> Result<String>;

    fn input_state(&self) -> PortState;
    fn output_state(&self) -> PortState;

    /// Send raw bytes on the output side
    fn send(&mut self, message: &[u8]) -> Result<()>;

    /// Release both sides. Terminal.
    fn close(&mut self);
}

enum InputSide {
    Idle(MidiInput),
    Connected {
        connection: MidiInputConnection<DeltaClock>,
        index: usize,
        name: String,
    },
    Closed,
}

enum OutputSide {
    Idle(MidiOutput),
    Connected {
        connection: MidiOutputConnection,
        index: usize,
        name: String,
    },
    Closed,
}

/// midir-backed MIDI driver
pub struct MidirBackend {
    client_name: String,
    input: InputSide,
    output: OutputSide,
    handler: MidiInputHandler,
}

impl MidirBackend {
    /// Create the input and output clients
    ///
    /// SysEx, timing clock and active sensing are filtered out on input.
    pub fn new(client_name: &str, handler: MidiInputHandler) -> Result<Self> {
        let mut input =
            MidiInput::new(client_name).map_err(|e| HwError::MidiInit(e.to_string()))?;
        input.ignore(Ignore::All);
        let output =
            MidiOutput::new(client_name).map_err(|e| HwError::MidiInit(e.to_string()))?;

        Ok(Self {
            client_name: client_name.to_string(),
            input: InputSide::Idle(input),
            output: OutputSide::Idle(output),
            handler,
        })
    }
}

/// Names of every port `io` can see, in port order
fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .map(|port| io.port_name(port).unwrap_or_else(|_| "Unknown".to_string()))
        .collect()
}

impl MidiBackend for MidirBackend {
    fn input_port_names(&self) -> Vec<String> {
        match &self.input {
            InputSide::Idle(midi_in) => port_names(midi_in),
            // The client is consumed by the connection; scan with a fresh one.
            _ => match MidiInput::new(&format!("{}-scan", self.client_name)) {
                Ok(scanner) => port_names(&scanner),
                Err(e) => {
                    log::warn!("MIDI port scan failed: {}", e);
                    Vec::new()
                }
            },
        }
    }

    fn output_port_names(&self) -> Vec<String> {
        match &self.output {
            OutputSide::Idle(midi_out) => port_names(midi_out),
            _ => match MidiOutput::new(&format!("{}-scan", self.client_name)) {
                Ok(scanner) => port_names(&scanner),
                Err(e) => {
                    log::warn!("MIDI port scan failed: {}", e);
                    Vec::new()
                }
            },
        }
    }

    fn open_input(&mut self, index: usize) -> Result<String> {
        let midi_in = match std::mem::replace(&mut self.input, InputSide::Closed) {
            InputSide::Idle(midi_in) => midi_in,
            other => {
                self.input = other;
                return Err(HwError::PortOpen {
                    index,
                    reason: "input side not idle".to_string(),
                });
            }
        };

        let ports = midi_in.ports();
        let Some(port) = ports.get(index) else {
            let count = ports.len();
            self.input = InputSide::Idle(midi_in);
            return Err(HwError::PortOutOfRange { index, count });
        };
        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let handler = Arc::clone(&self.handler);
        let result = midi_in.connect(
            port,
            &format!("{}-in", self.client_name),
            move |stamp: u64, message: &[u8], clock: &mut DeltaClock| {
                handler(clock.delta(stamp), message);
            },
            DeltaClock::new(),
        );

        match result {
            Ok(connection) => {
                self.input = InputSide::Connected {
                    connection,
                    index,
                    name: name.clone(),
                };
                Ok(name)
            }
            Err(e) => {
                let reason = e.to_string();
                self.input = InputSide::Idle(e.into_inner());
                Err(HwError::PortOpen { index, reason })
            }
        }
    }

    fn open_output(&mut self, index: usize) -> Result<String> {
        let midi_out = match std::mem::replace(&mut self.output, OutputSide::Closed) {
            OutputSide::Idle(midi_out) => midi_out,
            other => {
                self.output = other;
                return Err(HwError::PortOpen {
                    index,
                    reason: "output side not idle".to_string(),
                });
            }
        };

        let ports = midi_out.ports();
        let Some(port) = ports.get(index) else {
            let count = ports.len();
            self.output = OutputSide::Idle(midi_out);
            return Err(HwError::PortOutOfRange { index, count });
        };
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        match midi_out.connect(port, &format!("{}-out", self.client_name)) {
            Ok(connection) => {
                self.output = OutputSide::Connected {
                    connection,
                    index,
                    name: name.clone(),
                };
                Ok(name)
            }
            Err(e) => {
                let reason = e.to_string();
                self.output = OutputSide::Idle(e.into_inner());
                Err(HwError::PortOpen { index, reason })
            }
        }
    }

    fn input_state(&self) -> PortState {
        match &self.input {
            InputSide::Idle(_) => PortState::Unopened,
            InputSide::Connected { index, name, .. } => PortState::Open {
                index: *index,
                name: name.clone(),
            },
            InputSide::Closed => PortState::Closed,
        }
    }

    fn output_state(&self) -> PortState {
        match &self.output {
            OutputSide::Idle(_) => PortState::Unopened,
            OutputSide::Connected { index, name, .. } => PortState::Open {
                index: *index,
                name: name.clone(),
            },
            OutputSide::Closed => PortState::Closed,
        }
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        if let OutputSide::Connected { connection, .. } = &mut self.output {
            connection
                .send(message)
                .map_err(|e| HwError::Send(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let InputSide::Connected { connection, .. } =
            std::mem::replace(&mut self.input, InputSide::Closed)
        {
            connection.close();
        }
        if let OutputSide::Connected { connection, .. } =
            std::mem::replace(&mut self.output, OutputSide::Closed)
        {
            connection.close();
        }
    }
}

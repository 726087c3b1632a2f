//! MIDI module - paired MIDI input/output for the host
//!
//! Incoming messages are timestamped by the driver and handed to a host
//! callback; outgoing bytes are forwarded as-is.

mod backend;
mod bridge;
#[cfg(test)]
pub(crate) mod fake;
mod message;

pub use backend::{MidiBackend, MidiInputHandler, MidirBackend, PortState};
pub use bridge::{MessageCallback, MidiBridge};
pub use message::{note_name, DeltaClock, MessageKind, MidiMessage};

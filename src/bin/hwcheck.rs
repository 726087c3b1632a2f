//! hwcheck - hardware smoke test
//!
//! Lists MIDI ports, opens port 0, captures audio for a few seconds and
//! prints what arrives. Play some keys or make some noise while it runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chordcoach_hw::midi::{note_name, MessageKind, MidiMessage};
use chordcoach_hw::{AudioCapture, GlobalLock, MidiBridge};

/// How long to listen
const LISTEN_TIME: Duration = Duration::from_millis(2500);

/// Print a level line every Nth audio block (~1 per second at 16 kHz)
const LEVEL_EVERY: usize = 31;

fn main() {
    let config = chordcoach_hw::init_from_env();
    log::info!("Starting hwcheck");
    log::debug!("Config: {}", serde_json::to_string(&config).unwrap_or_default());

    // 1. MIDI
    let mut midi = MidiBridge::new(&config, Arc::new(GlobalLock));
    let ports = midi.port_names();
    println!("Available MIDI ports: {:?}", ports);

    if let Some(first) = ports.first() {
        println!("Opening port 0: {}", first);
        midi.open_port(0);
        midi.set_callback(|delta, bytes| {
            let message = MidiMessage::new(delta, bytes);
            match message.kind() {
                MessageKind::NoteOn { key, velocity, .. } => {
                    println!("MIDI Event {} (note on {} vel {})", message, note_name(key), velocity)
                }
                MessageKind::NoteOff { key, .. } => {
                    println!("MIDI Event {} (note off {})", message, note_name(key))
                }
                _ => println!("MIDI Event {}", message),
            }
            Ok(())
        });
    }

    // 2. Audio
    let mut audio = AudioCapture::new(Arc::new(GlobalLock));
    let blocks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&blocks);
    audio.set_callback(move |samples| {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if n % LEVEL_EVERY == 0 {
            let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
            println!("Audio block {}: {} frames, rms {:.4}, peak {:.4}", n, samples.len(), rms, peak);
        }
        Ok(())
    });
    audio.start_capture();

    println!("\nListening for {:.1} seconds...", LISTEN_TIME.as_secs_f32());
    thread::sleep(LISTEN_TIME);

    println!("\nStopping...");
    audio.stop_capture();
    midi.close();
    println!("Received {} audio blocks", blocks.load(Ordering::Relaxed));
}

//! Audio driver seam
//!
//! `AudioBackend` is what `AudioCapture` talks to. The real implementation
//! wraps cpal; tests swap in a fake driver.
//!
//! cpal streams are not `Send`, so `CpalBackend` builds each stream on a
//! dedicated worker thread that owns it for its whole life. The handle
//! returned to the adapter only holds channels and the join handle.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedBufferSize};

use crate::error::{HwError, Result};

/// Parameters of the capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channels (1 = mono)
    pub channels: u16,
    /// Samples delivered to the host per block
    pub frames_per_buffer: u32,
}

/// Mono, 16 kHz, 512-frame blocks. Not configurable.
pub const CAPTURE_PARAMS: StreamParams = StreamParams {
    sample_rate: 16_000,
    channels: 1,
    frames_per_buffer: 512,
};

/// An input device as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
}

/// Data callback handed to the driver. Runs on the driver's audio thread
/// with whatever slice length the driver chooses.
pub type InputHandler = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// An initialized audio driver
pub trait AudioBackend: Send {
    /// Human-readable driver name for diagnostics
    fn name(&self) -> String;

    /// The driver's default input device, if there is one
    fn default_input_device(&self) -> Option<DeviceInfo>;

    /// Open (but do not start) an input-only stream on `device`
    fn open_input_stream(
        &mut self,
        device: &DeviceInfo,
        params: &StreamParams,
        handler: InputHandler,
    ) -> Result<Box<dyn InputStream>>;
}

/// An open input stream
pub trait InputStream: Send {
    fn start(&mut self) -> Result<()>;

    /// Stop and close the stream. The data callback does not run again
    /// once this returns.
    fn close(self: Box<Self>);
}

/// cpal-backed audio driver using the platform's default host
pub struct CpalBackend {
    host_id: cpal::HostId,
}

impl CpalBackend {
    /// Bring up the default cpal host and check that it can enumerate
    /// input devices.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let _devices = host
            .input_devices()
            .map_err(|e| HwError::AudioInit(e.to_string()))?;
        Ok(Self { host_id: host.id() })
    }

    fn host(&self) -> Result<cpal::Host> {
        cpal::host_from_id(self.host_id).map_err(|e| HwError::AudioInit(e.to_string()))
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> String {
        format!("cpal ({})", self.host_id.name())
    }

    fn default_input_device(&self) -> Option<DeviceInfo> {
        let device = self.host().ok()?.default_input_device()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Some(DeviceInfo { name })
    }

    fn open_input_stream(
        &mut self,
        device: &DeviceInfo,
        params: &StreamParams,
        handler: InputHandler,
    ) -> Result<Box<dyn InputStream>> {
        let (command_tx, command_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let host_id = self.host_id;
        let device_name = device.name.clone();
        let params = *params;

        let worker = thread::Builder::new()
            .name("chordcoach-audio".to_string())
            .spawn(move || {
                run_stream(host_id, &device_name, &params, handler, command_rx, reply_tx)
            })
            .map_err(|e| HwError::StreamOpen(e.to_string()))?;

        match reply_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalInputStream {
                commands: command_tx,
                replies: reply_rx,
                worker: Some(worker),
            })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(HwError::StreamOpen("audio worker exited".to_string()))
            }
        }
    }
}

enum Command {
    Start,
    Stop,
}

/// Handle to a stream owned by a worker thread
struct CpalInputStream {
    commands: mpsc::Sender<Command>,
    replies: mpsc::Receiver<Result<()>>,
    worker: Option<JoinHandle<()>>,
}

impl InputStream for CpalInputStream {
    fn start(&mut self) -> Result<()> {
        self.commands
            .send(Command::Start)
            .map_err(|_| HwError::StreamStart("audio worker exited".to_string()))?;
        self.replies
            .recv()
            .map_err(|_| HwError::StreamStart("audio worker exited".to_string()))?
    }

    fn close(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Audio worker thread panicked");
            }
        }
    }
}

/// Worker thread body: build the stream, report back, then serve
/// commands until told to stop. Dropping the stream at the end closes it.
fn run_stream(
    host_id: cpal::HostId,
    device_name: &str,
    params: &StreamParams,
    handler: InputHandler,
    commands: mpsc::Receiver<Command>,
    replies: mpsc::Sender<Result<()>>,
) {
    let stream = match build_stream(host_id, device_name, params, handler) {
        Ok(stream) => {
            let _ = replies.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = replies.send(Err(e));
            return;
        }
    };

    // A closed channel means the handle is gone: treat it as Stop.
    while let Ok(command) = commands.recv() {
        match command {
            Command::Start => {
                let result = stream
                    .play()
                    .map_err(|e| HwError::StreamStart(e.to_string()));
                let _ = replies.send(result);
            }
            Command::Stop => break,
        }
    }

    if let Err(e) = stream.pause() {
        log::debug!("Audio stream pause on close failed: {}", e);
    }
}

fn build_stream(
    host_id: cpal::HostId,
    device_name: &str,
    params: &StreamParams,
    handler: InputHandler,
) -> Result<cpal::Stream> {
    let host = cpal::host_from_id(host_id).map_err(|e| HwError::StreamOpen(e.to_string()))?;
    let device = find_input_device(&host, device_name).ok_or(HwError::NoDefaultInputDevice)?;

    let (sample_format, buffer_size) = negotiate(&device, params);
    let config = cpal::StreamConfig {
        channels: params.channels,
        sample_rate: cpal::SampleRate(params.sample_rate),
        buffer_size,
    };
    log::info!("Audio config: {:?}, sample format {:?}", config, sample_format);

    let stream = match sample_format {
        SampleFormat::I16 => build_converting::<i16>(&device, &config, handler),
        SampleFormat::U16 => build_converting::<u16>(&device, &config, handler),
        SampleFormat::I32 => build_converting::<i32>(&device, &config, handler),
        _ => build_f32(&device, &config, handler),
    };
    stream.map_err(|e| HwError::StreamOpen(e.to_string()))
}

/// The device selected on the host thread, falling back to whatever is
/// default now.
fn find_input_device(host: &cpal::Host, name: &str) -> Option<cpal::Device> {
    let default = host.default_input_device();
    if default
        .as_ref()
        .and_then(|d| d.name().ok())
        .is_some_and(|n| n == name)
    {
        return default;
    }
    host.input_devices()
        .ok()
        .and_then(|mut devices| devices.find(|d| d.name().ok().as_deref() == Some(name)))
        .or(default)
}

/// Pick a sample format and buffer size the device supports at our rate
/// and channel count. Prefers f32; integer formats are converted on the
/// audio thread. Falls back to the driver's default buffer size when a
/// fixed 512-frame buffer is out of range.
fn negotiate(device: &cpal::Device, params: &StreamParams) -> (SampleFormat, cpal::BufferSize) {
    let rate = cpal::SampleRate(params.sample_rate);
    let ranges: Vec<_> = match device.supported_input_configs() {
        Ok(configs) => configs
            .filter(|r| {
                r.channels() == params.channels
                    && r.min_sample_rate() <= rate
                    && rate <= r.max_sample_rate()
            })
            .collect(),
        Err(e) => {
            log::warn!("Could not query input configs: {}", e);
            Vec::new()
        }
    };

    let chosen = ranges
        .iter()
        .find(|r| r.sample_format() == SampleFormat::F32)
        .or_else(|| {
            ranges.iter().find(|r| {
                matches!(
                    r.sample_format(),
                    SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32
                )
            })
        });

    let Some(range) = chosen else {
        // Nothing advertised: ask for the exact stream and let the driver decide.
        return (
            SampleFormat::F32,
            cpal::BufferSize::Fixed(params.frames_per_buffer),
        );
    };

    let buffer_size = match range.buffer_size() {
        SupportedBufferSize::Range { min, max }
            if (*min..=*max).contains(&params.frames_per_buffer) =>
        {
            cpal::BufferSize::Fixed(params.frames_per_buffer)
        }
        _ => cpal::BufferSize::Default,
    };

    (range.sample_format(), buffer_size)
}

fn build_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut handler: InputHandler,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_input_stream(
        config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| handler(data),
        |err| log::error!("Audio stream error: {}", err),
        None,
    )
}

fn build_converting<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut handler: InputHandler,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut converted: Vec<f32> = Vec::new();
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            converted.clear();
            converted.extend(data.iter().map(|&s| f32::from_sample(s)));
            handler(&converted);
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )
}

use crate::audio::AudioBackend;
use crate::runtime::SynthHost;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// cpal output backend. The engine renders fixed blocks; this layer
/// re-chunks them into whatever callback sizes the device asks for.
pub struct CpalBackend {
    stream: Option<Stream>,
    host: Arc<Mutex<SynthHost>>,
}

/// One rendered engine block carried across callback boundaries.
struct CarryBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
    cursor: usize,
    available: usize,
}

impl CarryBuffer {
    fn new(block: usize) -> Self {
        Self {
            left: vec![0.0; block],
            right: vec![0.0; block],
            cursor: 0,
            available: 0,
        }
    }
}

impl CpalBackend {
    pub fn new(host: Arc<Mutex<SynthHost>>) -> Self {
        Self { stream: None, host }
    }

    /// Sample rate the default output device will run at; the engine
    /// should be configured to match before the stream starts.
    pub fn default_sample_rate() -> Result<f32, Box<dyn std::error::Error>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no output device available")?;
        let config = device.default_output_config()?;
        Ok(config.sample_rate().0 as f32)
    }

    fn build_stream(&mut self) -> Result<Stream, Box<dyn std::error::Error>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no output device available")?;
        info!(device = %device.name().unwrap_or_default(), "output device");

        let supported_config = device.default_output_config()?;
        let stream_config: cpal::StreamConfig = supported_config.clone().into();
        let channels = stream_config.channels as usize;

        let synth = self.host.clone();
        let block = synth.lock().unwrap().block_size();
        let mut carry = CarryBuffer::new(block);

        let stream = match supported_config.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut synth = synth.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        if carry.cursor >= carry.available {
                            synth.process(&mut carry.left, &mut carry.right);
                            carry.cursor = 0;
                            carry.available = carry.left.len();
                        }
                        let left = carry.left[carry.cursor];
                        let right = carry.right[carry.cursor];
                        carry.cursor += 1;
                        for (channel, sample) in frame.iter_mut().enumerate() {
                            *sample = if channel % 2 == 0 { left } else { right };
                        }
                    }
                },
                |err| error!(%err, "stream error"),
                None,
            )?,
            _ => return Err("unsupported sample format".into()),
        };

        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn start(&mut self) {
        match self.build_stream() {
            Ok(stream) => {
                stream.play().expect("failed to start stream");
                self.stream = Some(stream);
            }
            Err(err) => error!(%err, "failed to build output stream"),
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            stream.pause().expect("failed to stop stream");
        }
    }
}

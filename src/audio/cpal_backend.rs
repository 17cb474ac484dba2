// src/audio/cpal_backend.rs  -  cpal output stream rendering scan chirps
//
// The stream callback owns the oscillator.  Triggering a chirp only stores
// a frame budget in an atomic, so the caller never blocks and never shares
// a lock with the audio thread.
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use super::{envelope, AudioOutput, Chirp};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Frames still to render for the current chirp, and its total/ramp length
#[derive(Default)]
struct Trigger {
    remaining: AtomicU32,
    total:     AtomicU32,
    ramp:      AtomicU32,
    hz_bits:   AtomicU32,
}

pub struct CpalAudio {
    trigger:     Arc<Trigger>,
    sample_rate: f32,
    _stream:     Stream,
}

// Stream is !Send on some platforms; it is only kept alive here
unsafe impl Send for CpalAudio {}

impl CpalAudio {
    pub fn new(volume: f32) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device"))?;
        let supported = device.default_output_config()?;
        let format    = supported.sample_format();
        let config      = supported.config();
        let sample_rate = config.sample_rate.0 as f32;
        let volume  = volume.clamp(0.0, 1.0);
        let trigger = Arc::new(Trigger::default());

        let t = Arc::clone(&trigger);
        let stream = match format {
            SampleFormat::F32 => chirp_stream::<f32>(&device, &config, t, volume)?,
            SampleFormat::I16 => chirp_stream::<i16>(&device, &config, t, volume)?,
            SampleFormat::U16 => chirp_stream::<u16>(&device, &config, t, volume)?,
            other             => return Err(anyhow!("Unsupported sample format {other:?}")),
        };
        stream.play()?;
        log::debug!("[audio] cpal stream at {} Hz", sample_rate);
        Ok(Self { trigger, sample_rate, _stream: stream })
    }
}

fn chirp_stream<S>(
    device:  &cpal::Device,
    config:  &cpal::StreamConfig,
    trigger: Arc<Trigger>,
    volume:  f32,
) -> Result<Stream>
where S: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>
{
    let channels = config.channels as usize;
    let rate     = config.sample_rate.0 as f32;
    let mut phase = 0.0f32;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
            let start = trigger.remaining.load(Ordering::Acquire);
            let total = trigger.total.load(Ordering::Acquire);
            let ramp  = trigger.ramp.load(Ordering::Relaxed);
            let step  = f32::from_bits(trigger.hz_bits.load(Ordering::Relaxed)) / rate;
            let mut left = start;
            for frame in data.chunks_mut(channels) {
                let value = if left > 0 {
                    let gain = envelope(total.saturating_sub(left), total, ramp);
                    let v = (phase * std::f32::consts::TAU).sin() * volume * gain;
                    phase = (phase + step).fract();
                    left -= 1;
                    v
                } else {
                    phase = 0.0;
                    0.0
                };
                let out = S::from_sample(value);
                frame.iter_mut().for_each(|s| *s = out);
            }
            // A chirp triggered while this buffer rendered wins
            let _ = trigger.remaining.compare_exchange(
                start, left, Ordering::AcqRel, Ordering::Relaxed,
            );
        },
        |e| log::error!("[audio] stream error: {e}"),
        None,
    )?;
    Ok(stream)
}

impl AudioOutput for CpalAudio {
    fn chirp(&mut self, c: &Chirp) -> Result<()> {
        let frames = (c.length.as_secs_f32() * self.sample_rate) as u32;
        let ramp   = (c.ramp.as_secs_f32() * self.sample_rate) as u32;
        self.trigger.hz_bits.store(c.hz.to_bits(), Ordering::Relaxed);
        self.trigger.ramp.store(ramp, Ordering::Relaxed);
        self.trigger.total.store(frames, Ordering::Release);
        self.trigger.remaining.store(frames, Ordering::Release);
        Ok(())
    }
}

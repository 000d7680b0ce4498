//! Speaker playback of synthesized MP3 audio

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Playback sample rate (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// How often the playing thread checks for completion or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Whether the default host exposes an output device
#[must_use]
pub fn has_output_device() -> bool {
    cpal::default_host().default_output_device().is_some()
}

/// How a blocking playback finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Completed,
    Cancelled,
}

/// Decode `mp3` and play it on the default output device, blocking the
/// calling thread until it finishes or `cancel` is raised
///
/// # Errors
///
/// Returns error if decoding fails or no output device can be opened
pub fn play_mp3_blocking(mp3: &[u8], cancel: &AtomicBool) -> Result<PlaybackEnd> {
    let samples = decode_mp3(mp3)?;
    play_samples_blocking(samples, cancel)
}

fn play_samples_blocking(samples: Vec<f32>, cancel: &AtomicBool) -> Result<PlaybackEnd> {
    if samples.is_empty() {
        return Ok(PlaybackEnd::Completed);
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(PLAYBACK_SAMPLE_RATE);
    let config: StreamConfig = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| Error::Audio("no 24kHz output config".to_string()))?
        .with_sample_rate(rate)
        .config();

    let channels = usize::from(config.channels);
    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                |err| tracing::error!(error = %err, "speaker stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let expected = Duration::from_millis((total as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE));
    let deadline = Instant::now() + expected + Duration::from_millis(500);

    let end = loop {
        if cancel.load(Ordering::Acquire) {
            break PlaybackEnd::Cancelled;
        }
        if position.load(Ordering::Relaxed) >= total || Instant::now() > deadline {
            break PlaybackEnd::Completed;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    drop(stream);
    tracing::debug!(samples = total, end = ?end, "playback finished");
    Ok(end)
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if a frame cannot be decoded
pub fn decode_mp3(mp3: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    #[allow(clippy::cast_precision_loss)]
                    let mean =
                        chunk.iter().map(|&s| f32::from(s)).sum::<f32>() / chunk.len() as f32;
                    mean / 32768.0
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_playback_completes_without_device() {
        let cancel = AtomicBool::new(false);
        assert_eq!(
            play_samples_blocking(Vec::new(), &cancel).unwrap(),
            PlaybackEnd::Completed
        );
    }
}

//! Audio fetching and decoding.
//!
//! Episode audio is downloaded (or read from disk) once, decoded with
//! symphonia into mono `f32` samples, and shared between the media element and
//! the waveform renderer through an [`AudioSlot`].

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::feed::fetch::is_remote;

/// Failure to load or decode episode audio.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("failed to download audio: {0}")]
    Fetch(String),
    #[error("failed to read audio file: {0}")]
    Io(String),
    #[error("unsupported audio format: {0}")]
    Probe(String),
    #[error("no audio track found")]
    NoTrack,
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("audio output error: {0}")]
    Output(String),
}

/// Fully decoded mono audio.
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decoded audio shared by everything bound to one episode.
pub type AudioSlot = Arc<OnceCell<Arc<DecodedAudio>>>;

/// Returns the episode's decoded audio, loading it on first use.
///
/// Concurrent callers share one download and decode. A failure is not
/// cached; the next caller tries again.
///
/// # Errors
/// - If the audio cannot be fetched or decoded
pub async fn load_audio(slot: &AudioSlot, source: &str) -> Result<Arc<DecodedAudio>, MediaError> {
    slot.get_or_try_init(|| async {
        let bytes = fetch_audio(source).await?;
        let hint = extension_hint(source);
        let decoded = tokio::task::spawn_blocking(move || decode(bytes, hint.as_deref()))
            .await
            .map_err(|e| MediaError::Decode(e.to_string()))??;
        tracing::info!(
            "Decoded {}: {:.1}s at {}Hz",
            source,
            decoded.duration(),
            decoded.sample_rate
        );
        Ok::<_, MediaError>(Arc::new(decoded))
    })
    .await
    .cloned()
}

/// Downloads or reads the raw audio bytes.
///
/// # Errors
/// - If the request fails or returns a non-success status
/// - If the local file cannot be read
pub async fn fetch_audio(source: &str) -> Result<Vec<u8>, MediaError> {
    if is_remote(source) {
        tracing::debug!("Downloading audio from {}", source);
        let response = reqwest::get(source)
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Fetch(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    } else {
        tokio::fs::read(source)
            .await
            .map_err(|e| MediaError::Io(format!("{source}: {e}")))
    }
}

fn extension_hint(source: &str) -> Option<String> {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Decodes an in-memory audio file into mono samples.
///
/// Channels are averaged. Packets that fail to decode are skipped.
///
/// # Errors
/// - If the container format is not recognized
/// - If there is no decodable audio track
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, MediaError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MediaError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(MediaError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(MediaError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => append_mono(&buffer, &mut samples),
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(MediaError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(MediaError::Decode("stream contains no samples".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Averages every channel of a decoded buffer into `out`.
fn append_mono(buffer: &AudioBufferRef, out: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::F32(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| s),
        AudioBufferRef::F64(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| s as f32),
        AudioBufferRef::S8(b) => {
            mix_planes(b.planes().planes(), b.frames(), out, |s| f32::from(s) / 128.0)
        }
        AudioBufferRef::S16(b) => {
            mix_planes(b.planes().planes(), b.frames(), out, |s| f32::from(s) / 32768.0)
        }
        AudioBufferRef::S24(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| {
            s.inner() as f32 / 8_388_608.0
        }),
        AudioBufferRef::S32(b) => {
            mix_planes(b.planes().planes(), b.frames(), out, |s| s as f32 / 2_147_483_648.0)
        }
        AudioBufferRef::U8(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| {
            (f32::from(s) - 128.0) / 128.0
        }),
        AudioBufferRef::U16(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| {
            (f32::from(s) - 32768.0) / 32768.0
        }),
        AudioBufferRef::U24(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| {
            (s.inner() as f32 - 8_388_608.0) / 8_388_608.0
        }),
        AudioBufferRef::U32(b) => mix_planes(b.planes().planes(), b.frames(), out, |s| {
            ((f64::from(s) - 2_147_483_648.0) / 2_147_483_648.0) as f32
        }),
    }
}

fn mix_planes<T: Copy>(planes: &[&[T]], frames: usize, out: &mut Vec<f32>, convert: impl Fn(T) -> f32) {
    if planes.is_empty() {
        return;
    }
    let scale = 1.0 / planes.len() as f32;
    out.reserve(frames);
    for frame in 0..frames {
        let sum: f32 = planes.iter().map(|plane| convert(plane[frame])).sum();
        out.push(sum * scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV file.
    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * u32::from(channels) * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_stereo_wav_to_mono() {
        // Left at half scale, right silent: mono is a quarter scale.
        let frames = 8000;
        let mut samples = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            samples.push(16384);
            samples.push(0);
        }
        let decoded = decode(wav_bytes(&samples, 8000, 2), Some("wav")).unwrap();

        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.samples.len(), frames);
        assert!((decoded.duration() - 1.0).abs() < 1e-9);
        assert!(decoded.samples.iter().all(|&s| (s - 0.25).abs() < 1e-4));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode(b"definitely not audio".to_vec(), None);
        assert!(matches!(result, Err(MediaError::Probe(_))));
    }

    #[test]
    fn test_extension_hint() {
        assert_eq!(extension_hint("https://cdn.example.com/ep1.MP3?x=1").as_deref(), Some("mp3"));
        assert_eq!(extension_hint("/tmp/episode.ogg").as_deref(), Some("ogg"));
        assert_eq!(extension_hint("https://cdn.example.com/stream"), None);
    }

    #[tokio::test]
    async fn test_load_audio_caches_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, wav_bytes(&[1000; 4000], 4000, 1)).unwrap();
        let source = path.to_str().unwrap().to_string();

        let slot = AudioSlot::default();
        let first = load_audio(&slot, &source).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = load_audio(&slot, &source).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_load_audio_missing_file() {
        let slot = AudioSlot::default();
        let result = load_audio(&slot, "/no/such/episode.mp3").await;
        assert!(matches!(result, Err(MediaError::Io(_))));
        assert!(slot.get().is_none());
    }
}

//! The output callback's half of a native media element.
//!
//! The UI thread talks to the callback through [`Transport`] atomics and a
//! lock-free command queue; the callback never takes a lock. Playback speed is
//! applied by resampling with rubato, so pitch follows speed.

use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::feed::EpisodeId;
use crate::player::PlayerEvent;

use super::decoder::{DecodedAudio, MediaError};
use super::spectrum::TapWriter;

/// Slowest playback rate the resampler accepts.
pub const MIN_RATE: f32 = 0.5;
/// Fastest playback rate the resampler accepts.
pub const MAX_RATE: f32 = 2.0;

/// Source frames fed to the resampler per call.
const CHUNK_FRAMES: usize = 1024;
const COMMAND_CAPACITY: usize = 64;

/// Playback state the UI thread sets and the callback reads, or the reverse.
#[derive(Debug)]
pub struct Transport {
    paused: AtomicBool,
    /// Set by the callback when the audio runs out
    ended: AtomicBool,
    /// `f32` bits
    volume: AtomicU32,
    /// `f64` bits, seconds
    position: AtomicU64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            paused: AtomicBool::new(true),
            ended: AtomicBool::new(false),
            volume: AtomicU32::new(1.0f32.to_bits()),
            position: AtomicU64::new(0.0f64.to_bits()),
        }
    }
}

impl Transport {
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn set_position(&self, seconds: f64) {
        self.position.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Clears the end-of-audio flag, returning whether it was set.
    pub fn take_ended(&self) -> bool {
        self.ended.swap(false, Ordering::AcqRel)
    }
}

/// Requests from the UI thread and the load task to the callback.
pub enum Command {
    Load(Box<LoadedTrack>),
    Seek(f64),
    Rate(f32),
    Tap(TapWriter),
}

pub type CommandSender = HeapProd<Command>;

pub fn command_queue() -> (CommandSender, HeapCons<Command>) {
    HeapRb::<Command>::new(COMMAND_CAPACITY).split()
}

fn sinc_parameters(ratio: f64) -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: if ratio < 1.0 { 0.90 } else { 0.95 },
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::Blackman,
    }
}

/// Decoded audio with its resampler and buffers, built off the audio thread.
pub struct LoadedTrack {
    audio: Arc<DecodedAudio>,
    resampler: SincFixedIn<f32>,
    /// Output frames per source frame at normal speed
    base_ratio: f64,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    pending: VecDeque<f32>,
    /// Source frames handed to the resampler so far
    consumed: usize,
}

impl LoadedTrack {
    /// # Errors
    /// - If either rate is zero or the resampler cannot be built
    pub fn new(audio: Arc<DecodedAudio>, device_rate: u32) -> Result<Self, MediaError> {
        if audio.sample_rate == 0 || device_rate == 0 {
            return Err(MediaError::Output(format!(
                "cannot resample {}Hz audio to a {}Hz device",
                audio.sample_rate, device_rate
            )));
        }
        let base_ratio = f64::from(device_rate) / f64::from(audio.sample_rate);
        let resampler = SincFixedIn::<f32>::new(
            base_ratio,
            f64::from(MAX_RATE / MIN_RATE),
            sinc_parameters(base_ratio),
            CHUNK_FRAMES,
            1,
        )
        .map_err(|e| MediaError::Output(format!("resampler setup failed: {e}")))?;

        let input = resampler.input_buffer_allocate(true);
        let output = resampler.output_buffer_allocate(true);
        let pending = VecDeque::with_capacity(resampler.output_frames_max());

        Ok(Self {
            audio,
            resampler,
            base_ratio,
            input,
            output,
            pending,
            consumed: 0,
        })
    }

    fn set_rate(&mut self, rate: f32, ramp: bool) {
        if let Err(e) = self
            .resampler
            .set_resample_ratio_relative(1.0 / f64::from(rate), ramp)
        {
            tracing::debug!("Playback rate {} rejected by resampler: {}", rate, e);
        }
    }

    fn seek(&mut self, seconds: f64) {
        let frame = (seconds * f64::from(self.audio.sample_rate)).max(0.0);
        self.consumed = (frame as usize).min(self.audio.samples.len());
        self.pending.clear();
        self.resampler.reset();
    }

    /// Resamples the next chunk into `pending`. Returns false once the source is exhausted.
    fn refill(&mut self) -> bool {
        let samples = &self.audio.samples;
        if self.consumed >= samples.len() {
            return false;
        }

        let needed = self.resampler.input_frames_next();
        let end = (self.consumed + needed).min(samples.len());
        let input = &mut self.input[0];
        input.clear();
        input.extend_from_slice(&samples[self.consumed..end]);
        input.resize(needed, 0.0);

        match self
            .resampler
            .process_into_buffer(&self.input, &mut self.output, None)
        {
            Ok((_, produced)) => {
                self.pending.extend(&self.output[0][..produced]);
                self.consumed = end;
                true
            }
            Err(_) => {
                self.consumed = samples.len();
                false
            }
        }
    }

    /// Position of the next sample heard, in seconds.
    fn position(&self, rate: f32) -> f64 {
        let buffered = self.pending.len() as f64 * f64::from(rate) / self.base_ratio;
        ((self.consumed as f64 - buffered) / f64::from(self.audio.sample_rate)).max(0.0)
    }
}

/// Everything the output callback owns.
pub struct Renderer {
    episode: EpisodeId,
    transport: Arc<Transport>,
    commands: HeapCons<Command>,
    events: Sender<PlayerEvent>,
    track: Option<Box<LoadedTrack>>,
    /// Seek requested before the audio arrived
    start_at: f64,
    rate: f32,
    ended_sent: bool,
    tap: Option<TapWriter>,
}

impl Renderer {
    pub fn new(
        episode: EpisodeId,
        transport: Arc<Transport>,
        commands: HeapCons<Command>,
        events: Sender<PlayerEvent>,
    ) -> Self {
        Self {
            episode,
            transport,
            commands,
            events,
            track: None,
            start_at: 0.0,
            rate: 1.0,
            ended_sent: false,
            tap: None,
        }
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::Load(mut track) => {
                    track.set_rate(self.rate, false);
                    track.seek(self.start_at);
                    self.track = Some(track);
                    self.ended_sent = false;
                }
                Command::Seek(seconds) => {
                    self.start_at = seconds;
                    self.ended_sent = false;
                    if let Some(track) = &mut self.track {
                        track.seek(seconds);
                    }
                }
                Command::Rate(rate) => {
                    self.rate = rate;
                    if let Some(track) = &mut self.track {
                        track.set_rate(rate, true);
                    }
                }
                Command::Tap(writer) => self.tap = Some(writer),
            }
        }
    }

    /// Fills one block of mono output.
    ///
    /// Paused or unloaded elements play silence without advancing. When the
    /// audio runs out the rest of the block is silent, the transport pauses
    /// and `Ended` is sent once.
    pub fn render(&mut self, out: &mut [f32]) {
        self.apply_commands();

        let Some(track) = self.track.as_deref_mut() else {
            out.fill(0.0);
            return;
        };
        if self.transport.is_paused() {
            out.fill(0.0);
            self.transport.set_position(track.position(self.rate));
            return;
        }

        let volume = self.transport.volume();
        let mut written = 0;
        while written < out.len() {
            if track.pending.is_empty() && !track.refill() {
                break;
            }
            while written < out.len() {
                let Some(sample) = track.pending.pop_front() else {
                    break;
                };
                out[written] = sample * volume;
                written += 1;
            }
        }
        out[written..].fill(0.0);
        self.transport.set_position(track.position(self.rate));

        if let Some(tap) = &mut self.tap {
            if !tap.write(out) {
                self.tap = None;
            }
        }

        if written < out.len() && !self.ended_sent {
            self.ended_sent = true;
            self.transport.set_paused(true);
            self.transport.ended.store(true, Ordering::Release);
            let _ = self.events.send(PlayerEvent::Ended {
                episode: self.episode,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::spectrum::SpectrumTap;
    use crate::player::{AnalyserConfig, FrequencySource};
    use ringbuf::traits::Producer;
    use std::sync::mpsc;

    const RATE: u32 = 8000;

    struct Harness {
        renderer: Renderer,
        commands: CommandSender,
        transport: Arc<Transport>,
        events: mpsc::Receiver<PlayerEvent>,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::channel();
        let transport = Arc::new(Transport::default());
        let (commands, consumer) = command_queue();
        Harness {
            renderer: Renderer::new(EpisodeId::new(9), transport.clone(), consumer, tx),
            commands,
            transport,
            events: rx,
        }
    }

    fn load(h: &mut Harness, samples: Vec<f32>) {
        let audio = Arc::new(DecodedAudio {
            samples,
            sample_rate: RATE,
        });
        let track = LoadedTrack::new(audio, RATE).unwrap();
        assert!(h.commands.try_push(Command::Load(Box::new(track))).is_ok());
    }

    fn ended_events(h: &Harness) -> usize {
        h.events
            .try_iter()
            .filter(|e| matches!(e, PlayerEvent::Ended { .. }))
            .count()
    }

    #[test]
    fn test_unloaded_and_paused_play_silence() {
        let mut h = harness();
        h.transport.set_paused(false);
        let mut out = [1.0f32; 256];
        h.renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        load(&mut h, vec![0.5; 4 * RATE as usize]);
        h.transport.set_paused(true);
        out.fill(1.0);
        h.renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(h.transport.position(), 0.0, "paused output does not advance");
        assert_eq!(ended_events(&h), 0);
    }

    #[test]
    fn test_volume_scales_samples() {
        let signal: Vec<f32> = (0..RATE as usize).map(|i| ((i % 50) as f32 / 50.0) - 0.5).collect();
        let mut full = harness();
        let mut half = harness();
        load(&mut full, signal.clone());
        load(&mut half, signal);
        half.transport.set_volume(0.5);
        full.transport.set_paused(false);
        half.transport.set_paused(false);

        let mut a = [0.0f32; 512];
        let mut b = [0.0f32; 512];
        for _ in 0..4 {
            full.renderer.render(&mut a);
            half.renderer.render(&mut b);
        }
        assert!(a.iter().any(|&s| s.abs() > 0.1));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x * 0.5 - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_end_of_audio_sends_ended_once() {
        let mut h = harness();
        load(&mut h, vec![0.25; 3000]);
        h.transport.set_paused(false);

        let mut out = [0.0f32; 512];
        for _ in 0..40 {
            h.renderer.render(&mut out);
        }
        assert_eq!(ended_events(&h), 1);
        assert!(h.transport.is_paused());
        assert!(h.transport.take_ended());

        // Playing again without a seek stays silent and does not repeat the event.
        h.transport.set_paused(false);
        h.renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(ended_events(&h), 0);
    }

    #[test]
    fn test_seek_before_load_applies_on_arrival() {
        let mut h = harness();
        assert!(h.commands.try_push(Command::Seek(12.5)).is_ok());
        load(&mut h, vec![0.0; 10 * RATE as usize]);

        let mut out = [0.0f32; 64];
        h.renderer.render(&mut out);
        assert_eq!(h.transport.position(), 10.0, "clamped to the end of the audio");
    }

    #[test]
    fn test_faster_rate_consumes_more_source() {
        let mut normal = harness();
        let mut fast = harness();
        load(&mut normal, vec![0.1; 4 * RATE as usize]);
        load(&mut fast, vec![0.1; 4 * RATE as usize]);
        assert!(fast.commands.try_push(Command::Rate(2.0)).is_ok());
        normal.transport.set_paused(false);
        fast.transport.set_paused(false);

        let mut out = [0.0f32; 800];
        for _ in 0..10 {
            normal.renderer.render(&mut out);
            fast.renderer.render(&mut out);
        }
        let ratio = fast.transport.position() / normal.transport.position();
        assert!((1.6..=2.4).contains(&ratio), "position ratio {ratio}");
    }

    #[test]
    fn test_rendered_audio_reaches_tap() {
        let mut h = harness();
        let (events, _rx) = mpsc::channel();
        let (mut tap, writer) =
            SpectrumTap::connect(EpisodeId::new(9), &AnalyserConfig::default(), true, events);
        assert!(h.commands.try_push(Command::Tap(writer)).is_ok());
        let signal: Vec<f32> = (0..RATE as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / RATE as f32).sin())
            .collect();
        load(&mut h, signal);
        h.transport.set_paused(false);

        let mut out = [0.0f32; 1024];
        h.renderer.render(&mut out);
        h.renderer.render(&mut out);

        let mut bins = vec![0u8; tap.frequency_bin_count()];
        tap.get_byte_frequency_data(&mut bins);
        assert!(bins.iter().any(|&b| b > 0));
    }
}

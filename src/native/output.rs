//! Native media element: decoded audio played through the default output device.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use crate::feed::EpisodeId;
use crate::player::{
    AnalyserConfig, AnalyzerError, FrequencySource, MediaDiagnostics, MediaElement, PlayTicket,
    PlayerEvent,
};

use super::decoder::{load_audio, AudioSlot, DecodedAudio, MediaError};
use super::render::{
    command_queue, Command, CommandSender, LoadedTrack, Renderer, Transport, MAX_RATE, MIN_RATE,
};
use super::spectrum::{SpectrumTap, TapFlags};

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// State shared between the UI thread and the load task. The output callback
/// never sees it.
struct MediaState {
    load: LoadState,
    audio: Option<Arc<DecodedAudio>>,
    pending_play: Option<PlayTicket>,
    /// Zero until the output stream is open
    device_rate: u32,
    track_queued: bool,
    commands: CommandSender,
}

impl MediaState {
    fn send(&mut self, command: Command) {
        if self.commands.try_push(command).is_err() {
            tracing::warn!("Audio command queue is full, dropping a command");
        }
    }

    /// Hands the decoded audio to the callback once both it and the device rate are known.
    fn queue_track(&mut self) -> Result<(), MediaError> {
        if self.track_queued || self.device_rate == 0 {
            return Ok(());
        }
        let Some(audio) = self.audio.clone() else {
            return Ok(());
        };
        let track = LoadedTrack::new(audio, self.device_rate)?;
        self.send(Command::Load(Box::new(track)));
        self.track_queued = true;
        Ok(())
    }
}

type SharedState = Arc<Mutex<MediaState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MediaState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One episode's audio, decoded in memory and streamed to the output device.
///
/// Audio is loaded on the first play request. The output stream is opened on
/// that same request and plays silence until the samples arrive. Changing the
/// playback rate resamples, so pitch follows speed.
pub struct NativeMedia {
    episode: EpisodeId,
    source: String,
    slot: AudioSlot,
    state: SharedState,
    transport: Arc<Transport>,
    /// Moved into the output callback once the stream opens
    renderer: Option<Renderer>,
    tap: Option<Arc<TapFlags>>,
    rate: f32,
    output_running: bool,
    events: Sender<PlayerEvent>,
    runtime: Handle,
    stream: Option<Stream>,
}

impl NativeMedia {
    pub fn new(
        episode: EpisodeId,
        source: String,
        slot: AudioSlot,
        events: Sender<PlayerEvent>,
        runtime: Handle,
    ) -> Self {
        let transport = Arc::new(Transport::default());
        let (commands, pending) = command_queue();
        let renderer = Renderer::new(episode, transport.clone(), pending, events.clone());
        Self {
            episode,
            source,
            slot,
            state: Arc::new(Mutex::new(MediaState {
                load: LoadState::Idle,
                audio: None,
                pending_play: None,
                device_rate: 0,
                track_queued: false,
                commands,
            })),
            transport,
            renderer: Some(renderer),
            tap: None,
            rate: 1.0,
            output_running: false,
            events,
            runtime,
            stream: None,
        }
    }

    /// Starts the background load unless one is running or already finished.
    fn start_loading(&self) {
        {
            let mut state = lock(&self.state);
            if matches!(state.load, LoadState::Loading | LoadState::Loaded) {
                return;
            }
            state.load = LoadState::Loading;
        }

        let episode = self.episode;
        let source = self.source.clone();
        let slot = self.slot.clone();
        let shared = self.state.clone();
        let transport = self.transport.clone();
        let events = self.events.clone();

        self.runtime.spawn(async move {
            let result = load_audio(&slot, &source).await;
            let mut state = lock(&shared);
            let result = result.and_then(|audio| {
                state.audio = Some(audio.clone());
                state.queue_track().map(|()| audio)
            });
            match result {
                Ok(audio) => {
                    state.load = LoadState::Loaded;
                    let _ = events.send(PlayerEvent::MetadataLoaded {
                        episode,
                        duration: audio.duration(),
                    });
                    if let Some(ticket) = state.pending_play.take() {
                        transport.set_paused(false);
                        let _ = events.send(PlayerEvent::PlaybackStarted { ticket });
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to load episode {}: {}", episode, e);
                    state.audio = None;
                    state.load = LoadState::Failed(e.to_string());
                    let _ = events.send(PlayerEvent::MediaError {
                        episode,
                        message: e.to_string(),
                    });
                    if let Some(ticket) = state.pending_play.take() {
                        let _ = events.send(PlayerEvent::PlaybackFailed {
                            ticket,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        });
    }

    /// Opens the default output device the first time it is needed.
    fn ensure_stream(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let (mut handoff, pickup) = HeapRb::<Renderer>::new(1).split();
        let (stream, device_rate) = open_output(pickup)?;
        if let Some(renderer) = self.renderer.take() {
            let _ = handoff.try_push(renderer);
        }
        self.stream = Some(stream);

        let mut state = lock(&self.state);
        state.device_rate = device_rate;
        state.queue_track()?;
        Ok(())
    }

    /// Tracks whether the output stream runs, completing a deferred analyser resume.
    fn set_output_running(&mut self, running: bool) {
        self.output_running = running;
        if let Some(flags) = &self.tap {
            if flags.set_output_running(running) {
                tracing::debug!("Analyser resumed for episode {}", self.episode);
                let _ = self.events.send(PlayerEvent::ContextResumed {
                    episode: self.episode,
                    result: Ok(()),
                });
            }
        }
    }

    fn fail_play(&self, ticket: PlayTicket, reason: String) {
        tracing::error!("Cannot start episode {}: {}", self.episode, reason);
        self.transport.set_paused(true);
        let _ = self.events.send(PlayerEvent::PlaybackFailed { ticket, reason });
    }
}

impl MediaElement for NativeMedia {
    fn source(&self) -> &str {
        &self.source
    }

    fn current_time(&self) -> f64 {
        self.transport.position()
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state).audio.as_ref().map(|audio| audio.duration())
    }

    fn is_paused(&self) -> bool {
        self.transport.is_paused()
    }

    fn play(&mut self, ticket: PlayTicket) {
        if let Err(e) = self.ensure_stream() {
            self.fail_play(ticket, e.to_string());
            return;
        }
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                self.fail_play(ticket, format!("Failed to start output stream: {e}"));
                return;
            }
        }
        self.set_output_running(true);

        let load = {
            let mut state = lock(&self.state);
            if self.transport.take_ended() {
                self.transport.set_position(0.0);
                state.send(Command::Seek(0.0));
            }
            match state.load {
                LoadState::Loaded => {
                    self.transport.set_paused(false);
                    let _ = self.events.send(PlayerEvent::PlaybackStarted { ticket });
                    false
                }
                _ => {
                    state.pending_play = Some(ticket);
                    true
                }
            }
        };

        if load {
            self.start_loading();
        }
    }

    fn pause(&mut self) {
        self.transport.set_paused(true);
        lock(&self.state).pending_play = None;
        self.set_output_running(false);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                tracing::debug!("Output stream could not pause: {}", e);
            }
        }
    }

    fn set_current_time(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let seconds = match self.duration() {
            Some(duration) => seconds.min(duration),
            None => seconds,
        };
        self.transport.take_ended();
        self.transport.set_position(seconds);
        lock(&self.state).send(Command::Seek(seconds));
    }

    fn volume(&self) -> f32 {
        self.transport.volume()
    }

    fn set_volume(&mut self, volume: f32) {
        self.transport.set_volume(volume.clamp(0.0, 1.0));
    }

    fn playback_rate(&self) -> f32 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f32) {
        if !rate.is_finite() || rate <= 0.0 {
            return;
        }
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
        lock(&self.state).send(Command::Rate(self.rate));
    }

    fn create_analyser(
        &mut self,
        config: &AnalyserConfig,
    ) -> Result<Box<dyn FrequencySource>, AnalyzerError> {
        if self.tap.is_some() {
            return Err(AnalyzerError::AlreadyConnected);
        }
        let (tap, writer) =
            SpectrumTap::connect(self.episode, config, self.output_running, self.events.clone());
        self.tap = Some(tap.flags());
        lock(&self.state).send(Command::Tap(writer));
        tracing::debug!("Analyser tapped into episode {}", self.episode);
        Ok(Box::new(tap))
    }

    fn diagnostics(&self) -> MediaDiagnostics {
        let state = lock(&self.state);
        MediaDiagnostics {
            source: self.source.clone(),
            current_time: self.transport.position(),
            duration: state.audio.as_ref().map(|audio| audio.duration()),
            paused: self.transport.is_paused(),
            volume: self.transport.volume(),
            playback_rate: self.rate,
            loaded: state.load == LoadState::Loaded,
            analyser_connected: self.tap.as_ref().is_some_and(|flags| flags.is_connected()),
        }
    }
}

/// Builds an output stream on the default device, returning it with the device rate.
///
/// The callback picks its [`Renderer`] up from `pickup`, so a failed build
/// leaves the renderer with its owner.
fn open_output(pickup: HeapCons<Renderer>) -> Result<(Stream, u32)> {
    let device = suppress_alsa_warnings(|| {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| anyhow!("No audio output device available"))
    })?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    let supported = device.default_output_config()?;
    let device_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    tracing::info!(
        "Output device: {} ({}Hz, {} channels)",
        device_name,
        device_rate,
        channels
    );

    let config: StreamConfig = supported.config();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, pickup)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, pickup)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, pickup)?,
        format => return Err(anyhow!("Unsupported output sample format: {format:?}")),
    };

    Ok((stream, device_rate))
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut pickup: HeapCons<Renderer>,
) -> Result<Stream> {
    let channels = channels.max(1);
    let mut renderer: Option<Renderer> = None;
    let mut mono = Vec::with_capacity(4096);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if let Some(picked) = pickup.try_pop() {
                renderer = Some(picked);
            }
            mono.resize(data.len() / channels, 0.0);
            match &mut renderer {
                Some(renderer) => renderer.render(&mut mono),
                None => mono.fill(0.0),
            }
            for (frame, &value) in data.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(T::from_sample(value));
            }
        },
        |err| {
            tracing::error!("Audio output error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

//! In-memory stand-ins for the platform capabilities, shared by the player tests.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::feed::{Episode, EpisodeId};

use super::analyzer::{AnalyserConfig, AnalyzerError, ContextState, FrequencySource};
use super::backend::PlayerBackend;
use super::media::{MediaDiagnostics, MediaElement, PlayTicket};
use super::waveform::{RendererError, WaveformConfig, WaveformRenderer};

pub fn episode(n: u32) -> Arc<Episode> {
    Arc::new(Episode {
        id: EpisodeId::new(n),
        title: format!("Episode {n}"),
        description: String::new(),
        image: format!("img/{n}.jpg"),
        audio_url: format!("https://cdn.example.com/{n}.mp3"),
        duration: "30:00".to_string(),
        date: "2024-03-01".to_string(),
        featured: false,
        popular: false,
    })
}

/// What `create_analyser` does on a fake element.
#[derive(Debug, Clone)]
pub enum AnalyserMode {
    Available { bins: Vec<u8>, state: ContextState },
    Unavailable,
    Broken(String),
}

impl AnalyserMode {
    pub fn available(bins: Vec<u8>) -> Self {
        Self::Available {
            bins,
            state: ContextState::Running,
        }
    }

    pub fn suspended(bins: Vec<u8>) -> Self {
        Self::Available {
            bins,
            state: ContextState::Suspended,
        }
    }
}

#[derive(Debug)]
pub struct FakeAnalyserState {
    pub bins: Vec<u8>,
    pub state: ContextState,
    pub reads: usize,
    pub resume_calls: usize,
    pub disconnect_calls: usize,
    pub fail_disconnect: bool,
}

pub struct FakeAnalyser(Rc<RefCell<FakeAnalyserState>>);

impl FrequencySource for FakeAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.0.borrow().bins.len()
    }

    fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        let mut state = self.0.borrow_mut();
        state.reads += 1;
        for (slot, value) in out.iter_mut().zip(state.bins.iter()) {
            *slot = *value;
        }
    }

    fn state(&self) -> ContextState {
        self.0.borrow().state
    }

    fn resume(&mut self) {
        self.0.borrow_mut().resume_calls += 1;
    }

    fn disconnect(&mut self) -> Result<(), AnalyzerError> {
        let mut state = self.0.borrow_mut();
        state.disconnect_calls += 1;
        if state.fail_disconnect {
            return Err(AnalyzerError::Graph("node already disconnected".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeMediaState {
    pub current_time: f64,
    pub duration: Option<f64>,
    pub paused: bool,
    pub volume: f32,
    pub playback_rate: f32,
    pub plays: Vec<PlayTicket>,
    pub pause_calls: usize,
    pub seeks: Vec<f64>,
    pub analyser_mode: AnalyserMode,
    pub analyser_requests: usize,
    pub analyser: Option<Rc<RefCell<FakeAnalyserState>>>,
}

/// Media element whose state the test can inspect through any clone.
#[derive(Clone)]
pub struct FakeMedia {
    source: String,
    state: Rc<RefCell<FakeMediaState>>,
}

impl FakeMedia {
    pub fn new(source: &str, analyser_mode: AnalyserMode) -> Self {
        Self {
            source: source.to_string(),
            state: Rc::new(RefCell::new(FakeMediaState {
                current_time: 0.0,
                duration: None,
                paused: true,
                volume: 1.0,
                playback_rate: 1.0,
                plays: Vec::new(),
                pause_calls: 0,
                seeks: Vec::new(),
                analyser_mode,
                analyser_requests: 0,
                analyser: None,
            })),
        }
    }

    pub fn state(&self) -> Ref<'_, FakeMediaState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, FakeMediaState> {
        self.state.borrow_mut()
    }

    pub fn analyser(&self) -> Option<Rc<RefCell<FakeAnalyserState>>> {
        self.state.borrow().analyser.clone()
    }

    pub fn set_position(&self, current_time: f64, duration: Option<f64>) {
        let mut state = self.state.borrow_mut();
        state.current_time = current_time;
        state.duration = duration;
    }

    pub fn last_ticket(&self) -> Option<PlayTicket> {
        self.state.borrow().plays.last().copied()
    }
}

impl MediaElement for FakeMedia {
    fn source(&self) -> &str {
        &self.source
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.state.borrow().duration
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn play(&mut self, ticket: PlayTicket) {
        let mut state = self.state.borrow_mut();
        state.paused = false;
        state.plays.push(ticket);
    }

    fn pause(&mut self) {
        let mut state = self.state.borrow_mut();
        state.paused = true;
        state.pause_calls += 1;
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        state.current_time = seconds;
        state.seeks.push(seconds);
    }

    fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.borrow_mut().volume = volume;
    }

    fn playback_rate(&self) -> f32 {
        self.state.borrow().playback_rate
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.state.borrow_mut().playback_rate = rate;
    }

    fn create_analyser(
        &mut self,
        _config: &AnalyserConfig,
    ) -> Result<Box<dyn FrequencySource>, AnalyzerError> {
        let mut state = self.state.borrow_mut();
        state.analyser_requests += 1;
        if state.analyser.is_some() {
            return Err(AnalyzerError::AlreadyConnected);
        }
        match state.analyser_mode.clone() {
            AnalyserMode::Available { bins, state: context } => {
                let shared = Rc::new(RefCell::new(FakeAnalyserState {
                    bins,
                    state: context,
                    reads: 0,
                    resume_calls: 0,
                    disconnect_calls: 0,
                    fail_disconnect: false,
                }));
                state.analyser = Some(shared.clone());
                Ok(Box::new(FakeAnalyser(shared)))
            }
            AnalyserMode::Unavailable => Err(AnalyzerError::Unavailable),
            AnalyserMode::Broken(reason) => Err(AnalyzerError::Graph(reason)),
        }
    }

    fn diagnostics(&self) -> MediaDiagnostics {
        let state = self.state.borrow();
        MediaDiagnostics {
            source: self.source.clone(),
            current_time: state.current_time,
            duration: state.duration,
            paused: state.paused,
            volume: state.volume,
            playback_rate: state.playback_rate,
            loaded: state.duration.is_some(),
            analyser_connected: state.analyser.is_some(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeRendererState {
    pub play_calls: usize,
    pub pause_calls: usize,
    pub stop_calls: usize,
    pub seeks: Vec<f64>,
    pub volume: Option<f32>,
    pub playback_rate: Option<f32>,
    pub destroy_calls: usize,
}

#[derive(Clone, Default)]
pub struct FakeRenderer(Rc<RefCell<FakeRendererState>>);

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, FakeRendererState> {
        self.0.borrow()
    }

    pub fn shared(&self) -> Rc<RefCell<FakeRendererState>> {
        self.0.clone()
    }
}

impl WaveformRenderer for FakeRenderer {
    fn play(&mut self) {
        self.0.borrow_mut().play_calls += 1;
    }

    fn pause(&mut self) {
        self.0.borrow_mut().pause_calls += 1;
    }

    fn stop(&mut self) {
        self.0.borrow_mut().stop_calls += 1;
    }

    fn seek_to(&mut self, fraction: f64) {
        self.0.borrow_mut().seeks.push(fraction);
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.borrow_mut().volume = Some(volume);
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.0.borrow_mut().playback_rate = Some(rate);
    }

    fn peaks(&self) -> Option<Arc<[f32]>> {
        None
    }

    fn destroy(&mut self) {
        self.0.borrow_mut().destroy_calls += 1;
    }
}

/// Backend that hands out fakes and keeps a handle on each for inspection.
pub struct FakeBackend {
    pub analyser_mode: AnalyserMode,
    pub renderer_unsupported: bool,
    media: BTreeMap<EpisodeId, FakeMedia>,
    renderers: BTreeMap<EpisodeId, FakeRenderer>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            analyser_mode: AnalyserMode::available(vec![128; 128]),
            renderer_unsupported: false,
            media: BTreeMap::new(),
            renderers: BTreeMap::new(),
        }
    }

    pub fn media(&self, episode: EpisodeId) -> FakeMedia {
        self.media[&episode].clone()
    }

    pub fn renderer(&self, episode: EpisodeId) -> Option<Rc<RefCell<FakeRendererState>>> {
        self.renderers.get(&episode).map(FakeRenderer::shared)
    }
}

impl PlayerBackend for FakeBackend {
    fn create_media(&mut self, episode: &Episode) -> Box<dyn MediaElement> {
        let media = FakeMedia::new(&episode.audio_url, self.analyser_mode.clone());
        self.media.insert(episode.id, media.clone());
        Box::new(media)
    }

    fn create_renderer(
        &mut self,
        episode: &Episode,
        _config: &WaveformConfig,
    ) -> Result<Box<dyn WaveformRenderer>, RendererError> {
        if self.renderer_unsupported {
            return Err(RendererError::Unsupported);
        }
        let renderer = FakeRenderer::new();
        self.renderers.insert(episode.id, renderer.clone());
        Ok(Box::new(renderer))
    }
}

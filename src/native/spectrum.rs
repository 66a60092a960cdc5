//! Frequency analysis of the audio actually sent to the output device.
//!
//! The output callback writes every mono sample it plays into a lock-free
//! ring through a [`TapWriter`]. The [`SpectrumTap`] on the UI thread drains
//! that ring into its own window of the newest `fft_size` samples and turns
//! it into byte-scaled frequency magnitudes.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::feed::EpisodeId;
use crate::player::{AnalyserConfig, AnalyzerError, ContextState, FrequencySource, PlayerEvent};

/// Samples buffered between two analyser reads (about 0.7 s at 48 kHz).
const TAP_CAPACITY: usize = 1 << 15;

/// State shared by a tap's writer, its analyser and the media element.
#[derive(Debug)]
pub struct TapFlags {
    connected: AtomicBool,
    output_running: AtomicBool,
    resume_pending: AtomicBool,
}

impl TapFlags {
    fn new(output_running: bool) -> Self {
        Self {
            connected: AtomicBool::new(true),
            output_running: AtomicBool::new(output_running),
            resume_pending: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_output_running(&self) -> bool {
        self.output_running.load(Ordering::Acquire)
    }

    /// Records whether the output stream is running.
    ///
    /// Returns true when a resume was waiting for the output to start; the
    /// caller then reports it as succeeded.
    pub fn set_output_running(&self, running: bool) -> bool {
        self.output_running.store(running, Ordering::Release);
        running && self.is_connected() && self.resume_pending.swap(false, Ordering::AcqRel)
    }
}

/// Output-side half of a tap, owned by the audio callback.
pub struct TapWriter {
    producer: HeapProd<f32>,
    flags: Arc<TapFlags>,
}

impl TapWriter {
    /// Copies played samples into the tap, dropping what does not fit.
    ///
    /// Returns false once the analyser has disconnected.
    pub fn write(&mut self, samples: &[f32]) -> bool {
        if !self.flags.is_connected() {
            return false;
        }
        self.producer.push_slice(samples);
        true
    }
}

/// Byte-scaled FFT magnitudes with exponential smoothing across frames.
pub struct FrequencyAnalyzer {
    fft_planner: FftPlanner<f32>,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl FrequencyAnalyzer {
    pub fn new(config: &AnalyserConfig) -> Self {
        let n = config.fft_size;
        // Blackman window
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft_planner: FftPlanner::new(),
            fft_size: n,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window,
            smoothed: vec![0.0; n / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyzes one window of samples and writes a byte per bin into `out`.
    ///
    /// `samples` must hold `fft_size` samples. Magnitudes are smoothed with the
    /// previous frame, converted to decibels, and mapped linearly from
    /// `[min_decibels, max_decibels]` onto `0..=255`.
    pub fn analyze(&mut self, samples: &[f32], out: &mut [u8]) {
        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        let fft = self.fft_planner.plan_fft_forward(self.fft_size);
        fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        let range = self.max_decibels - self.min_decibels;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = buffer[k].norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
        }

        for (slot, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 / range * (db - self.min_decibels);
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

/// Analyser node tapped into a native media element's output.
pub struct SpectrumTap {
    episode: EpisodeId,
    consumer: HeapCons<f32>,
    flags: Arc<TapFlags>,
    analyzer: FrequencyAnalyzer,
    recent: VecDeque<f32>,
    window: Vec<f32>,
    events: Sender<PlayerEvent>,
}

impl SpectrumTap {
    /// Creates an analyser and the writer the output callback feeds it through.
    pub fn connect(
        episode: EpisodeId,
        config: &AnalyserConfig,
        output_running: bool,
        events: Sender<PlayerEvent>,
    ) -> (Self, TapWriter) {
        let (producer, consumer) = HeapRb::<f32>::new(TAP_CAPACITY.max(config.fft_size * 2)).split();
        let flags = Arc::new(TapFlags::new(output_running));
        let tap = Self {
            episode,
            consumer,
            flags: flags.clone(),
            analyzer: FrequencyAnalyzer::new(config),
            recent: VecDeque::with_capacity(config.fft_size),
            window: vec![0.0; config.fft_size],
            events,
        };
        (tap, TapWriter { producer, flags })
    }

    pub fn flags(&self) -> Arc<TapFlags> {
        self.flags.clone()
    }

    /// Moves everything the callback wrote into the newest-samples window.
    fn fill_window(&mut self) {
        let capacity = self.window.len();
        while let Some(sample) = self.consumer.try_pop() {
            if self.recent.len() == capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(sample);
        }

        self.window.fill(0.0);
        let offset = capacity - self.recent.len();
        for (slot, sample) in self.window[offset..].iter_mut().zip(self.recent.iter()) {
            *slot = *sample;
        }
    }

    fn report_resume(&self, result: Result<(), String>) {
        let _ = self.events.send(PlayerEvent::ContextResumed {
            episode: self.episode,
            result,
        });
    }
}

impl FrequencySource for SpectrumTap {
    fn frequency_bin_count(&self) -> usize {
        self.analyzer.bin_count()
    }

    fn get_byte_frequency_data(&mut self, out: &mut [u8]) {
        self.fill_window();
        self.analyzer.analyze(&self.window, out);
    }

    fn state(&self) -> ContextState {
        if !self.flags.is_connected() {
            ContextState::Closed
        } else if self.flags.is_output_running() {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    /// The output stream belongs to the media element. While it is stopped
    /// the resume is held and reported when the element starts its output.
    fn resume(&mut self) {
        match self.state() {
            ContextState::Running => self.report_resume(Ok(())),
            ContextState::Closed => self.report_resume(Err("analyser is disconnected".to_string())),
            ContextState::Suspended => {
                tracing::debug!("Episode {} analyser resumes once output starts", self.episode);
                self.flags.resume_pending.store(true, Ordering::Release);
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), AnalyzerError> {
        if !self.flags.connected.swap(false, Ordering::AcqRel) {
            return Err(AnalyzerError::Graph("analyser already disconnected".to_string()));
        }
        self.flags.resume_pending.store(false, Ordering::Release);
        self.recent.clear();
        tracing::debug!("Analyser for episode {} disconnected", self.episode);
        Ok(())
    }
}

//! Turn segmentation: a live sample stream becomes one bounded utterance.
//!
//! Loudness is the RMS of each frame's amplitudes. Once any frame crosses the
//! silence threshold the `speaking` flag latches; from then on, consecutive
//! below-threshold frames count toward the silence limit and recording stops
//! when the limit is reached. A hard frame cap bounds latency and memory even
//! if the speaker never pauses. All frames are retained, including leading
//! silence, so the transcription service sees the full onset.

use crate::audio::{AudioCapture, AudioConfig, AudioFrame};
use crate::error::{VoiceError, VoiceResult};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Segmentation thresholds. Durations are converted to frame counts against
/// the active audio configuration.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// RMS level above which a frame counts as speech (default: 500.0).
    /// Lower is more sensitive; raise for noisy environments.
    pub silence_threshold: f32,
    /// Seconds of post-speech silence that end the utterance (default: 2.0).
    pub silence_secs: f32,
    /// Hard cap on utterance length in seconds (default: 45.0).
    pub max_record_secs: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 500.0,
            silence_secs: 2.0,
            max_record_secs: 45.0,
        }
    }
}

impl SegmenterConfig {
    /// Consecutive quiet frames after speech that end the utterance.
    pub fn silence_limit(&self, sample_rate: u32, frame_size: usize) -> usize {
        (sample_rate as f32 / frame_size as f32 * self.silence_secs) as usize
    }

    /// Absolute frame cap for one utterance.
    pub fn max_frames(&self, sample_rate: u32, frame_size: usize) -> usize {
        (sample_rate as f32 / frame_size as f32 * self.max_record_secs) as usize
    }
}

/// Root-mean-square amplitude of one frame.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// One bounded audio segment corresponding to a single spoken turn.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Signed 16-bit PCM, mono.
    pub samples: Vec<i16>,
    /// Sample rate the segment was captured at.
    pub sample_rate: u32,
    /// When segmentation completed.
    pub captured_at: DateTime<Utc>,
}

impl Utterance {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Whether the accumulator wants more frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentProgress {
    Recording,
    Complete,
}

/// Pure per-frame segmentation state machine: feed frames, get a completion
/// decision. Separated from capture so boundary logic is testable with
/// synthetic streams.
pub struct FrameAccumulator {
    silence_threshold: f32,
    silence_limit: usize,
    max_frames: usize,
    samples: Vec<i16>,
    frames: usize,
    speaking: bool,
    silent_frames: usize,
}

impl FrameAccumulator {
    pub fn new(config: &SegmenterConfig, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            silence_threshold: config.silence_threshold,
            silence_limit: config.silence_limit(sample_rate, frame_size),
            max_frames: config.max_frames(sample_rate, frame_size),
            samples: Vec::new(),
            frames: 0,
            speaking: false,
            silent_frames: 0,
        }
    }

    /// Append one frame and decide whether the utterance is complete.
    pub fn push(&mut self, frame: &[i16]) -> SegmentProgress {
        self.samples.extend_from_slice(frame);
        self.frames += 1;

        let level = rms(frame);
        if level > self.silence_threshold {
            self.speaking = true;
            self.silent_frames = 0;
        } else if self.speaking {
            self.silent_frames += 1;
            if self.silent_frames >= self.silence_limit {
                debug!(frames = self.frames, "silence limit reached after speech");
                return SegmentProgress::Complete;
            }
        }

        if self.frames >= self.max_frames {
            debug!(frames = self.frames, "hard frame cap reached");
            return SegmentProgress::Complete;
        }
        SegmentProgress::Recording
    }

    /// Whether speech has been detected so far.
    pub fn speaking(&self) -> bool {
        self.speaking
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn into_utterance(self, sample_rate: u32) -> Utterance {
        Utterance {
            samples: self.samples,
            sample_rate,
            captured_at: Utc::now(),
        }
    }
}

/// Source of discrete utterances. The live segmenter implements this over the
/// microphone; tests substitute scripted sources.
pub trait UtteranceSource {
    /// Block until the next utterance is bounded, the hard cap is hit, or
    /// cancellation is observed (then `VoiceError::Interrupted`).
    fn next_utterance(&mut self) -> VoiceResult<Utterance>;
}

/// Live segmenter over the default microphone. The device is opened per
/// utterance and released as soon as the boundary decision is made, before
/// any downstream service call runs. Cancellation is honored only between
/// frames, never mid-frame.
pub struct TurnSegmenter {
    audio: AudioConfig,
    config: SegmenterConfig,
    stop: Arc<AtomicBool>,
}

impl TurnSegmenter {
    pub fn new(audio: AudioConfig, config: SegmenterConfig, stop: Arc<AtomicBool>) -> Self {
        Self {
            audio,
            config,
            stop,
        }
    }
}

impl UtteranceSource for TurnSegmenter {
    fn next_utterance(&mut self) -> VoiceResult<Utterance> {
        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>();
        let capture = AudioCapture::new(self.audio.clone())?;
        // Keep the stream alive for the scope of this call; dropping it
        // releases the device even if a later service call fails.
        let _stream = capture.start_capture(frame_tx)?;

        info!("listening (speak now)");
        let mut accumulator =
            FrameAccumulator::new(&self.config, self.audio.sample_rate, self.audio.frame_size);

        // Poll interval: twice the frame duration, so the stop flag is seen
        // promptly even when the device goes quiet.
        let frame_wait = Duration::from_secs_f64(
            2.0 * self.audio.frame_size as f64 / self.audio.sample_rate as f64,
        );

        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Err(VoiceError::Interrupted);
            }
            match frame_rx.recv_timeout(frame_wait) {
                Ok(frame) => {
                    if accumulator.push(&frame.samples) == SegmentProgress::Complete {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(VoiceError::Stream("capture channel closed".to_string()));
                }
            }
        }

        let utterance = accumulator.into_utterance(self.audio.sample_rate);
        debug!(
            samples = utterance.samples.len(),
            secs = utterance.duration().as_secs_f32(),
            "utterance bounded"
        );
        Ok(utterance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    const FRAME: usize = 1024;

    fn config() -> SegmenterConfig {
        SegmenterConfig::default()
    }

    fn quiet_frame() -> Vec<i16> {
        vec![0; FRAME]
    }

    fn loud_frame() -> Vec<i16> {
        vec![2_000; FRAME]
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&quiet_frame()), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_amplitude_equals_amplitude() {
        let frame = vec![1_000i16; 64];
        assert!((rms(&frame) - 1_000.0).abs() < 1.0);
    }

    #[test]
    fn all_silence_runs_to_the_hard_cap() {
        let cfg = config();
        let max = cfg.max_frames(RATE, FRAME);
        let mut acc = FrameAccumulator::new(&cfg, RATE, FRAME);

        let mut pushed = 0;
        loop {
            pushed += 1;
            if acc.push(&quiet_frame()) == SegmentProgress::Complete {
                break;
            }
            assert!(pushed < max, "should have completed at the cap");
        }
        assert_eq!(pushed, max);
        assert!(!acc.speaking());
        assert_eq!(acc.into_utterance(RATE).samples.len(), max * FRAME);
    }

    #[test]
    fn speech_then_silence_stops_at_the_silence_limit() {
        let cfg = config();
        let limit = cfg.silence_limit(RATE, FRAME);
        let n_loud = 5;
        let mut acc = FrameAccumulator::new(&cfg, RATE, FRAME);

        for _ in 0..n_loud {
            assert_eq!(acc.push(&loud_frame()), SegmentProgress::Recording);
        }
        assert!(acc.speaking());

        for i in 0..limit {
            let progress = acc.push(&quiet_frame());
            if i + 1 == limit {
                assert_eq!(progress, SegmentProgress::Complete);
            } else {
                assert_eq!(progress, SegmentProgress::Recording);
            }
        }
        // Exactly N + silence_limit frames retained, not the hard cap.
        assert_eq!(acc.frames(), n_loud + limit);
    }

    #[test]
    fn resumed_speech_resets_the_silence_counter() {
        let cfg = config();
        let limit = cfg.silence_limit(RATE, FRAME);
        let mut acc = FrameAccumulator::new(&cfg, RATE, FRAME);

        acc.push(&loud_frame());
        for _ in 0..limit - 1 {
            acc.push(&quiet_frame());
        }
        // Speaker resumes before the limit; counter starts over.
        assert_eq!(acc.push(&loud_frame()), SegmentProgress::Recording);
        for i in 0..limit {
            let progress = acc.push(&quiet_frame());
            assert_eq!(
                progress,
                if i + 1 == limit {
                    SegmentProgress::Complete
                } else {
                    SegmentProgress::Recording
                }
            );
        }
    }

    #[test]
    fn leading_silence_is_retained() {
        let cfg = config();
        let limit = cfg.silence_limit(RATE, FRAME);
        let mut acc = FrameAccumulator::new(&cfg, RATE, FRAME);

        acc.push(&quiet_frame());
        acc.push(&quiet_frame());
        acc.push(&loud_frame());
        for _ in 0..limit {
            acc.push(&quiet_frame());
        }
        assert_eq!(acc.frames(), 3 + limit);
        let utterance = acc.into_utterance(RATE);
        assert_eq!(utterance.samples.len(), (3 + limit) * FRAME);
    }

    #[test]
    fn boundary_decision_is_deterministic_for_identical_streams() {
        let cfg = config();
        let run = || {
            let mut acc = FrameAccumulator::new(&cfg, RATE, FRAME);
            let mut count = 0;
            loop {
                count += 1;
                if acc.push(&quiet_frame()) == SegmentProgress::Complete {
                    break;
                }
            }
            count
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn utterance_duration_reflects_sample_count() {
        let u = Utterance {
            samples: vec![0; RATE as usize],
            sample_rate: RATE,
            captured_at: Utc::now(),
        };
        assert_eq!(u.duration(), Duration::from_secs(1));
        assert!(!u.is_empty());
    }

    #[test]
    fn derived_limits_match_the_frame_math() {
        let cfg = config();
        // 16000 / 1024 * 2.0 = 31.25 -> 31 frames of silence
        assert_eq!(cfg.silence_limit(RATE, FRAME), 31);
        // 16000 / 1024 * 45 = 703.125 -> 703 frames cap
        assert_eq!(cfg.max_frames(RATE, FRAME), 703);
    }
}

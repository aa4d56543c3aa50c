//! Audio-thread source voices.

use crate::graph::SourceSpec;
use crate::host::AudioBuffer;
use crossbeam_channel::Receiver;
use leveler_core::SourceKind;
use leveler_effects::ModulatedTone;
use std::sync::Arc;

/// Linear-interpolating rate converter fed one input sample at a time.
#[derive(Debug, Clone)]
pub(crate) struct Interpolator {
    step: f64,
    frac: f64,
    prev: f32,
    next: f32,
}

impl Interpolator {
    fn new(source_rate: u32, output_rate: f32) -> Self {
        let step = if output_rate > 0.0 {
            f64::from(source_rate) / f64::from(output_rate)
        } else {
            1.0
        };
        Self {
            step,
            frac: 0.0,
            prev: 0.0,
            next: 0.0,
        }
    }

    fn is_unity(&self) -> bool {
        (self.step - 1.0).abs() < 1e-9
    }

    #[inline]
    fn next_sample(&mut self, mut pull: impl FnMut() -> f32) -> f32 {
        if self.is_unity() {
            return pull();
        }
        self.frac += self.step;
        while self.frac >= 1.0 {
            self.frac -= 1.0;
            self.prev = self.next;
            self.next = pull();
        }
        self.prev + (self.next - self.prev) * self.frac as f32
    }
}

/// Looping player over a shared recording.
#[derive(Debug, Clone)]
pub(crate) struct SamplePlayer {
    buffer: Arc<AudioBuffer>,
    position: usize,
    rate: Interpolator,
}

impl SamplePlayer {
    fn pull(buffer: &AudioBuffer, position: &mut usize) -> f32 {
        let Some(&sample) = buffer.samples.get(*position) else {
            *position = 0;
            return buffer.samples.first().copied().unwrap_or(0.0);
        };
        *position += 1;
        if *position >= buffer.samples.len() {
            *position = 0;
        }
        sample
    }

    fn next_sample(&mut self) -> f32 {
        let Self {
            buffer,
            position,
            rate,
        } = self;
        rate.next_sample(|| Self::pull(buffer, position))
    }
}

/// The signal origin of a running graph.
#[derive(Debug)]
pub(crate) enum SourceVoice {
    Tone(ModulatedTone),
    Live {
        samples: Receiver<f32>,
        rate: Interpolator,
        running: bool,
    },
    Sample {
        player: SamplePlayer,
        running: bool,
    },
}

impl SourceVoice {
    /// Voice for `spec`, stopped.
    pub(crate) fn new(spec: SourceSpec, sample_rate: f32) -> Self {
        match spec {
            SourceSpec::Tone(settings) => SourceVoice::Tone(ModulatedTone::new(sample_rate, settings)),
            SourceSpec::Live {
                samples,
                sample_rate: device_rate,
            } => SourceVoice::Live {
                samples,
                rate: Interpolator::new(device_rate, sample_rate),
                running: false,
            },
            SourceSpec::Sample(buffer) => {
                let rate = Interpolator::new(buffer.sample_rate, sample_rate);
                SourceVoice::Sample {
                    player: SamplePlayer {
                        buffer,
                        position: 0,
                        rate,
                    },
                    running: false,
                }
            }
        }
    }

    pub(crate) fn kind(&self) -> SourceKind {
        match self {
            SourceVoice::Tone(_) => SourceKind::Tone,
            SourceVoice::Live { .. } => SourceKind::Live,
            SourceVoice::Sample { .. } => SourceKind::Sample,
        }
    }

    pub(crate) fn start(&mut self) {
        match self {
            SourceVoice::Tone(tone) => tone.start(),
            SourceVoice::Live { samples, running, .. } => {
                // Anything captured before activation is stale.
                while samples.try_recv().is_ok() {}
                *running = true;
            }
            SourceVoice::Sample { player, running } => {
                player.position = 0;
                *running = true;
            }
        }
    }

    pub(crate) fn stop(&mut self) {
        match self {
            SourceVoice::Tone(tone) => tone.stop(),
            SourceVoice::Live { running, .. } | SourceVoice::Sample { running, .. } => {
                *running = false;
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        match self {
            SourceVoice::Tone(tone) => tone.is_running(),
            SourceVoice::Live { running, .. } | SourceVoice::Sample { running, .. } => *running,
        }
    }

    /// Next sample; silence when stopped or when live input underruns.
    #[inline]
    pub(crate) fn next_sample(&mut self) -> f32 {
        match self {
            SourceVoice::Tone(tone) => tone.next_sample(),
            SourceVoice::Live {
                samples,
                rate,
                running,
            } => {
                if !*running {
                    return 0.0;
                }
                rate.next_sample(|| samples.try_recv().unwrap_or(0.0))
            }
            SourceVoice::Sample { player, running } => {
                if !*running {
                    return 0.0;
                }
                player.next_sample()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use leveler_effects::ToneSettings;

    #[test]
    fn stopped_voices_are_silent() {
        let mut tone = SourceVoice::new(SourceSpec::Tone(ToneSettings::default()), 48000.0);
        assert_eq!(tone.kind(), SourceKind::Tone);
        assert!((0..64).all(|_| tone.next_sample() == 0.0));
        tone.start();
        assert!((0..64).any(|_| tone.next_sample() != 0.0));
        tone.stop();
        assert_eq!(tone.next_sample(), 0.0);
    }

    #[test]
    fn sample_loops_at_matching_rate() {
        let buffer = Arc::new(AudioBuffer::new(vec![0.1, 0.2, 0.3], 48000));
        let mut voice = SourceVoice::new(SourceSpec::Sample(buffer), 48000.0);
        voice.start();
        let out: Vec<f32> = (0..7).map(|_| voice.next_sample()).collect();
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1]);
    }

    #[test]
    fn sample_at_half_rate_is_stretched() {
        let buffer = Arc::new(AudioBuffer::new(vec![0.0, 1.0, 0.0, -1.0], 24000));
        let mut voice = SourceVoice::new(SourceSpec::Sample(buffer), 48000.0);
        voice.start();
        let out: Vec<f32> = (0..16).map(|_| voice.next_sample()).collect();
        // Two output samples per input sample, with interpolated midpoints.
        assert!(out.iter().any(|&s| (s - 0.5).abs() < 1e-6));
        assert!(out.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn live_voice_drops_stale_input_and_underruns_to_silence() {
        let (tx, rx) = unbounded();
        tx.send(0.9).unwrap();
        let mut voice = SourceVoice::new(
            SourceSpec::Live {
                samples: rx,
                sample_rate: 48000,
            },
            48000.0,
        );
        voice.start();
        assert_eq!(voice.next_sample(), 0.0);
        tx.send(0.4).unwrap();
        assert_eq!(voice.next_sample(), 0.4);
        assert_eq!(voice.next_sample(), 0.0);
    }
}

//! WAV reading and writing, to files or to memory.
//!
//! Recordings never touch disk: the capture path encodes samples with
//! [`encode_wav`] and hands the bytes to a decoder, the same way a browser
//! hands a recorded blob to its audio decoder.

use crate::Result;
use hound::{SampleFormat, WavReader, WavWriter};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

/// WAV stream specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample. 32 means IEEE float, anything else is PCM.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

fn write_samples<W: Write + Seek>(mut writer: WavWriter<W>, samples: &[f32], spec: WavSpec) -> Result<()> {
    if spec.bits_per_sample == 32 {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i32 << (spec.bits_per_sample - 1)) as f32;
        for &sample in samples {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            writer.write_sample(int_sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Samples as f32, mixed down to mono by averaging channels.
fn read_samples<R: Read>(reader: WavReader<R>) -> Result<(Vec<f32>, WavSpec)> {
    let spec = WavSpec::from(reader.spec());
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match reader.spec().sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Ok((mono, spec))
}

/// Read a WAV file as mono f32 samples.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavSpec)> {
    read_samples(WavReader::open(path)?)
}

/// Write interleaved samples to a WAV file.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], spec: WavSpec) -> Result<()> {
    write_samples(WavWriter::create(path, spec.into())?, samples, spec)
}

/// Encode samples as a complete WAV byte stream.
///
/// ```rust
/// use leveler_io::{WavSpec, decode_wav, encode_wav};
///
/// let bytes = encode_wav(&[0.0, 0.5, -0.5], WavSpec::default()).unwrap();
/// assert_eq!(&bytes[..4], b"RIFF");
/// let (samples, _) = decode_wav(&bytes).unwrap();
/// assert_eq!(samples, vec![0.0, 0.5, -0.5]);
/// ```
pub fn encode_wav(samples: &[f32], spec: WavSpec) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_samples(WavWriter::new(Cursor::new(&mut bytes), spec.into())?, samples, spec)?;
    Ok(bytes)
}

/// Decode a WAV byte stream to mono f32 samples.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, WavSpec)> {
    read_samples(WavReader::new(Cursor::new(bytes))?)
}

//! Integration tests for leveler-io WAV I/O and the mock backend.

use leveler_io::{
    AudioBackend, BackendStreamConfig, MockBackend, WavSpec, decode_wav, encode_wav, read_wav,
    write_wav,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::NamedTempFile;

fn sine_wave(sample_rate: u32, freq_hz: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[test]
fn recording_survives_memory_and_file_paths() {
    let sr = 44100;
    let take = sine_wave(sr, 200.0, sr as usize / 2);
    let spec = WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 32,
    };

    let bytes = encode_wav(&take, spec).unwrap();
    let (from_memory, memory_spec) = decode_wav(&bytes).unwrap();

    let file = NamedTempFile::new().unwrap();
    write_wav(file.path(), &take, spec).unwrap();
    let (from_file, file_spec) = read_wav(file.path()).unwrap();

    assert_eq!(memory_spec, spec);
    assert_eq!(file_spec, spec);
    assert_eq!(from_memory, from_file);
    assert_eq!(std::fs::read(file.path()).unwrap(), bytes);
    for (a, b) in take.iter().zip(&from_memory) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn empty_recording_encodes_to_valid_header() {
    let bytes = encode_wav(&[], WavSpec::default()).unwrap();
    let (samples, spec) = decode_wav(&bytes).unwrap();
    assert!(samples.is_empty());
    assert_eq!(spec.sample_rate, 48000);
}

#[test]
fn mock_backend_loops_input_to_output() {
    let backend = MockBackend::new(48000);
    let last = Arc::new(AtomicU32::new(0));

    let writer = Arc::clone(&last);
    let _input = backend
        .build_input_stream(
            &BackendStreamConfig::default(),
            Box::new(move |samples| {
                if let Some(s) = samples.last() {
                    writer.store(s.to_bits(), Ordering::Relaxed);
                }
            }),
            Box::new(|_| {}),
        )
        .unwrap();

    let reader = Arc::clone(&last);
    let _output = backend
        .build_output_stream(
            &BackendStreamConfig {
                channels: 1,
                ..BackendStreamConfig::default()
            },
            Box::new(move |buf| buf.fill(f32::from_bits(reader.load(Ordering::Relaxed)))),
            Box::new(|_| {}),
        )
        .unwrap();

    backend.feed_input(&[0.1, 0.2, 0.3]);
    let out = backend.pull_output(4);
    assert_eq!(out, vec![0.3; 4]);
    assert_eq!(backend.list_devices().unwrap().len(), 2);
}

use super::dispatch::{append_downmixed_samples, FrameDispatcher};
use super::sampler::normalized_rms;
use super::{LevelSampler, LiveMeter, WavEncoder};
use crate::notify::NotificationSink;
use crossbeam_channel::bounded;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    levels: Mutex<Vec<f32>>,
    statuses: Mutex<Vec<String>>,
}

impl NotificationSink for RecordingSink {
    fn on_level(&self, level: f32) {
        self.levels.lock().unwrap().push(level);
    }

    fn on_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }
}

#[test]
fn downmixes_multi_channel_audio() {
    let mut buf = Vec::new();
    let samples = [1.0f32, -1.0, 0.5, 0.5];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![0.0, 0.5]);
}

#[test]
fn preserves_single_channel_audio() {
    let mut buf = Vec::new();
    let samples = [0.1f32, 0.2, 0.3];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, samples);
}

#[test]
fn downmix_handles_trailing_partial_frame() {
    let mut buf = Vec::new();
    let samples = [0.2f32, 0.4, 0.6];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf.len(), 2);
    assert!((buf[0] - 0.3).abs() < 1e-6);
    assert!((buf[1] - 0.6).abs() < 1e-6);
}

#[test]
fn dispatcher_emits_fixed_size_frames() {
    let (sender, receiver) = bounded(8);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(4, sender, dropped.clone());

    dispatcher.push(&[0.1f32, 0.2, 0.3], 1, |sample| sample);
    assert!(receiver.try_recv().is_err(), "partial frame must not flush");

    dispatcher.push(&[0.4f32, 0.5], 1, |sample| sample);
    let frame = receiver.try_recv().expect("frame after enough samples");
    assert_eq!(frame, vec![0.1, 0.2, 0.3, 0.4]);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

#[test]
fn dispatcher_counts_drops_on_full_channel() {
    let (sender, receiver) = bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(2, sender, dropped.clone());

    dispatcher.push(&[0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6], 1, |sample| sample);
    assert_eq!(dropped.load(Ordering::Relaxed), 2);
    assert_eq!(receiver.try_recv().unwrap(), vec![0.1, 0.2]);
}

#[test]
fn normalized_rms_of_empty_frame_is_no_signal() {
    assert_eq!(normalized_rms(&[]), 0.0);
}

#[test]
fn normalized_rms_of_full_scale_square_is_one() {
    let frame = [1.0f32, -1.0, 1.0, -1.0];
    assert!((normalized_rms(&frame) - 1.0).abs() < 1e-6);
}

#[test]
fn normalized_rms_clamps_out_of_range_input() {
    let frame = [2.0f32, -2.0];
    assert_eq!(normalized_rms(&frame), 1.0);
}

#[test]
fn sampler_notifies_sink_once_per_call() {
    let sink = Arc::new(RecordingSink::default());
    let sampler = LevelSampler::new(sink.clone());

    let level = sampler.sample(&[0.5f32, -0.5, 0.5, -0.5]);
    assert!((level - 0.5).abs() < 1e-6);
    let levels = sink.levels.lock().unwrap();
    assert_eq!(levels.len(), 1);
    assert!((levels[0] - 0.5).abs() < 1e-6);
}

#[test]
fn sampler_reports_no_signal_for_empty_frame() {
    let sink = Arc::new(RecordingSink::default());
    let sampler = LevelSampler::new(sink.clone());
    assert_eq!(sampler.sample(&[]), 0.0);
    assert_eq!(sink.levels.lock().unwrap().as_slice(), &[0.0]);
}

#[test]
fn sampler_updates_live_meter() {
    let sink = Arc::new(RecordingSink::default());
    let sampler = LevelSampler::new(sink);
    let meter = sampler.meter();
    sampler.sample(&[0.25f32, -0.25]);
    assert!((meter.level() - 0.25).abs() < 1e-6);
}

#[test]
fn live_meter_defaults_to_no_signal() {
    let meter = LiveMeter::new();
    assert_eq!(meter.level(), 0.0);
}

#[test]
fn encoder_counts_fragments_in_order() {
    let mut encoder = WavEncoder::new(16_000);
    encoder.write_fragment(&[0.0f32; 320]);
    encoder.write_fragment(&[0.5f32; 320]);
    assert_eq!(encoder.fragments(), 2);
    assert_eq!(encoder.samples(), 640);
}

#[test]
fn encoder_finalizes_parseable_wav() {
    let mut encoder = WavEncoder::new(16_000);
    encoder.write_fragment(&[0.5f32; 160]);
    encoder.write_fragment(&[-0.5f32; 160]);
    let wav = encoder.finalize().expect("finalize should succeed");

    let reader = hound::WavReader::new(Cursor::new(wav)).expect("valid WAV header");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16_000);
    assert_eq!(spec.bits_per_sample, 16);
    let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 320);
    assert!(samples[0] > 16_000);
    assert!(samples[160] < -16_000);
}

#[test]
fn encoder_clamps_overdriven_samples() {
    let mut encoder = WavEncoder::new(8_000);
    encoder.write_fragment(&[4.0f32, -4.0]);
    let wav = encoder.finalize().expect("finalize should succeed");
    let reader = hound::WavReader::new(Cursor::new(wav)).expect("valid WAV header");
    let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
    assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
}

#[test]
fn encoder_finalizes_empty_capture() {
    let encoder = WavEncoder::new(16_000);
    let wav = encoder.finalize().expect("empty WAV is still valid");
    let reader = hound::WavReader::new(Cursor::new(wav)).expect("valid WAV header");
    assert_eq!(reader.len(), 0);
}

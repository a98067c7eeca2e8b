//! In-memory WAV encoding for the captured clip.
//!
//! Fragments are quantized and appended in arrival order while a session
//! records; finalizing assembles them into one WAV buffer for upload.
//! Nothing is ever written to disk by the encoder itself.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Encoder handle scoped to one recording session. Append-only while
/// recording; consumed by `finalize`.
pub struct WavEncoder {
    spec: WavSpec,
    fragments: Vec<Vec<i16>>,
}

impl WavEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            spec: WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
            fragments: Vec::new(),
        }
    }

    /// Quantize one mono f32 frame to 16-bit PCM and append it.
    pub fn write_fragment(&mut self, frame: &[f32]) {
        let fragment = frame
            .iter()
            .map(|sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect();
        self.fragments.push(fragment);
    }

    /// Number of fragments appended so far.
    pub fn fragments(&self) -> usize {
        self.fragments.len()
    }

    /// Total encoded samples across all fragments.
    pub fn samples(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }

    /// Assemble the accumulated fragments into a finished WAV buffer.
    pub fn finalize(self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.spec)
                .context("failed to initialize WAV stream")?;
            for fragment in &self.fragments {
                for &sample in fragment {
                    writer
                        .write_sample(sample)
                        .context("failed to encode audio fragment")?;
                }
            }
            writer.finalize().context("failed to finalize WAV stream")?;
        }
        Ok(cursor.into_inner())
    }
}

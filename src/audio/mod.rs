//! Audio capture plumbing: device acquisition, frame framing, level
//! sampling, voice activity detection, and WAV encoding.
//!
//! Audio is captured via cpal, downmixed to mono f32, and handed to the
//! session worker one fixed-size frame per tick.

mod dispatch;
mod encoder;
mod recorder;
mod sampler;
#[cfg(test)]
mod tests;
mod vad;

pub use encoder::WavEncoder;
pub use recorder::{FrameStream, Recorder};
pub use sampler::{LevelSampler, LiveMeter};
pub use vad::{Classification, VadParams, VoiceActivityDetector};

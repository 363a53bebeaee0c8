//! Audio encoding and streaming for TTS output

mod encoder;
mod streaming;

pub use encoder::{decode_wav, inspect_wav, AudioEncoder, WavSummary, WAV_CONTENT_TYPE};
pub use streaming::{wav_stream, StreamingConfig};

//! Inference: the model worker bridge, the shared engine and the generation pipeline

pub(crate) mod bridge;
mod engine;
mod generation;
mod generator;

pub use bridge::{WorkerBridge, WorkerStatus};
pub use engine::InferenceEngine;
pub use generation::{generate_audio, GenerationOptions, Generator, Preprocessor, Waveform};
pub use generator::BridgeGenerator;

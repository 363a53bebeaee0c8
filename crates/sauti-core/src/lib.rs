//! Sauti Core - Bark text-to-speech engine
//!
//! This crate turns a text prompt and a voice preset into a mono waveform using the
//! pretrained Bark model, and encodes the result as WAV.
//!
//! # Architecture
//!
//! - Model files resolve through the Hugging Face Hub cache
//! - Tokenization and voice-preset prompts are prepared natively
//! - The network itself runs in a Python worker reached over a Unix socket
//! - One [`InferenceEngine`] per process owns the device and the loaded model
//!
//! # Example
//!
//! ```ignore
//! use sauti_core::{Device, EngineConfig, HubModelLoader, InferenceEngine, VoicePreset, WorkerBridge};
//!
//! let config = EngineConfig::default();
//! let bridge = Arc::new(WorkerBridge::new(&config));
//! let loader = Arc::new(HubModelLoader::new(config, bridge));
//! let engine = InferenceEngine::new(loader, Device::Cpu);
//!
//! let waveform = engine.synthesize("Hello, world!".into(), VoicePreset::default()).await?;
//! ```

pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod inference;
pub mod model;
pub mod tensor;
pub mod tokenizer;
pub mod voice;

pub use config::{EngineConfig, ServerConfig};
pub use device::{AcceleratorInfo, Device, DevicePreference};
pub use error::{Error, Result};
pub use inference::{
    generate_audio, GenerationOptions, Generator, InferenceEngine, Preprocessor, Waveform,
    WorkerBridge,
};
pub use model::{HubModelLoader, ModelHandles, ModelLoader};
pub use voice::{VoicePreset, DEFAULT_VOICE_PRESET};

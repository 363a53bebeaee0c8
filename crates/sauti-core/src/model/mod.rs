//! Pretrained model resolution and loading for Bark

mod loader;
pub mod presets;
mod processor;
mod registry;

pub use loader::{read_sample_rate, HubModelLoader, ModelHandles, ModelLoader, DEFAULT_SAMPLE_RATE};
pub use presets::{PresetFiles, VoicePresetIndex, VoicePrompt};
pub use processor::BarkProcessor;
pub use registry::ModelRegistry;

//! Capability seams and the text-to-waveform pipeline

use tracing::{debug, error};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::tensor::{ModelInputs, Tensor};
use crate::voice::VoicePreset;

/// Turns a prompt and voice preset into model-ready tensors.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, prompt: &str, preset: &VoicePreset) -> Result<ModelInputs>;
}

/// A loaded model that turns input tensors into a waveform tensor.
pub trait Generator: Send + Sync {
    /// Device the model weights live on.
    fn device(&self) -> Device;

    /// Native output sample rate, from the model's static configuration.
    fn sample_rate(&self) -> u32;

    fn generate(&self, inputs: ModelInputs, options: &GenerationOptions) -> Result<Tensor>;
}

/// Options passed to every generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Sample instead of decoding greedily
    pub do_sample: bool,
    /// Run without autograd bookkeeping
    pub inference_mode: bool,
}

impl GenerationOptions {
    pub fn sampling() -> Self {
        Self {
            do_sample: true,
            inference_mode: true,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::sampling()
    }
}

/// Mono audio samples at a fixed rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Synthesize `prompt` in the voice of `preset`.
///
/// Inputs are placed on the generator's device, generation samples under inference
/// mode, and the output is squeezed to a one-dimensional host array. Failures are
/// logged and returned as [`Error::GenerationError`], except unknown presets and a
/// model the runtime has lost, which keep their own kind.
pub fn generate_audio(
    preprocessor: &dyn Preprocessor,
    generator: &dyn Generator,
    prompt: &str,
    preset: &VoicePreset,
) -> Result<Waveform> {
    debug!("Generating audio for {} chars with preset {}", prompt.len(), preset);

    run_pipeline(preprocessor, generator, prompt, preset).map_err(|e| {
        let e = e.into_generation_error();
        error!("Error generating audio: {}", e);
        e
    })
}

fn run_pipeline(
    preprocessor: &dyn Preprocessor,
    generator: &dyn Generator,
    prompt: &str,
    preset: &VoicePreset,
) -> Result<Waveform> {
    let inputs = preprocessor
        .preprocess(prompt, preset)?
        .to_device(generator.device());

    let output = generator
        .generate(inputs, &GenerationOptions::sampling())?
        .to_host()
        .squeeze();

    if output.ndim() > 1 {
        return Err(Error::GenerationError(format!(
            "Expected a one-dimensional waveform, got shape {:?}",
            output.shape()
        )));
    }

    let samples = output.into_f32_vec()?;
    let sample_rate = generator.sample_rate();
    debug!("Generated {} samples at {} Hz", samples.len(), sample_rate);

    Ok(Waveform {
        samples,
        sample_rate,
    })
}

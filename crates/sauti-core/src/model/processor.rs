//! Bark input preparation: tokenized text plus speaker history prompts

use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::inference::Preprocessor;
use crate::model::presets::{VoicePresetIndex, VoicePrompt};
use crate::model::registry::ModelRegistry;
use crate::tensor::{ModelInputs, Tensor};
use crate::tokenizer::Tokenizer;
use crate::voice::VoicePreset;

pub struct BarkProcessor {
    tokenizer: Tokenizer,
    presets: VoicePresetIndex,
    registry: Arc<ModelRegistry>,
    max_text_tokens: usize,
}

impl BarkProcessor {
    pub fn new(
        tokenizer: Tokenizer,
        presets: VoicePresetIndex,
        registry: Arc<ModelRegistry>,
        max_text_tokens: usize,
    ) -> Self {
        Self {
            tokenizer,
            presets,
            registry,
            max_text_tokens,
        }
    }

    pub fn presets(&self) -> &VoicePresetIndex {
        &self.presets
    }

    fn voice_prompt(&self, preset: &VoicePreset) -> Result<VoicePrompt> {
        let files = self.presets.get(preset)?;
        let repo = self.presets.repo().unwrap_or(self.registry.model_id());

        let fetch = |name: &str| {
            self.registry.fetch_from(repo, name).map_err(|e| {
                Error::GenerationError(format!("Voice preset {} unavailable: {}", preset, e))
            })
        };

        let semantic = fetch(&files.semantic_prompt)?;
        let coarse = fetch(&files.coarse_prompt)?;
        let fine = fetch(&files.fine_prompt)?;
        VoicePrompt::load(&semantic, &coarse, &fine)
    }
}

impl Preprocessor for BarkProcessor {
    fn preprocess(&self, prompt: &str, preset: &VoicePreset) -> Result<ModelInputs> {
        let encoding = self.tokenizer.encode_padded(prompt, self.max_text_tokens)?;
        debug!(
            "Tokenized prompt into {} tokens (padded to {})",
            encoding.length, self.max_text_tokens
        );

        let len = encoding.input_ids.len();
        let mut inputs = ModelInputs::new();
        inputs.insert("input_ids", Tensor::from_i64(vec![1, len], encoding.input_ids)?);
        inputs.insert(
            "attention_mask",
            Tensor::from_i64(vec![1, len], encoding.attention_mask)?,
        );

        self.voice_prompt(preset)?.insert_into(&mut inputs);
        Ok(inputs)
    }
}

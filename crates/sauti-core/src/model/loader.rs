//! Model loading: resolve the pretrained artifacts and bring the model up on a device

use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::inference::{BridgeGenerator, Generator, Preprocessor, WorkerBridge};
use crate::model::presets::VoicePresetIndex;
use crate::model::processor::BarkProcessor;
use crate::model::registry::ModelRegistry;
use crate::tokenizer::Tokenizer;

/// Bark emits audio at 24 kHz unless its generation config says otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

const WEIGHT_FILES: &[&str] = &["model.safetensors", "pytorch_model.bin"];
const PRESET_INDEX_FILE: &str = "speaker_embeddings_path.json";

/// The preprocessing and generation capabilities of one loaded model
pub struct ModelHandles {
    pub preprocessor: Box<dyn Preprocessor>,
    pub generator: Box<dyn Generator>,
}

impl ModelHandles {
    pub fn sample_rate(&self) -> u32 {
        self.generator.sample_rate()
    }

    pub fn device(&self) -> Device {
        self.generator.device()
    }
}

/// Loads a pretrained model onto a device.
pub trait ModelLoader: Send + Sync {
    fn model_id(&self) -> &str;

    fn load(&self, device: Device) -> Result<ModelHandles>;

    /// Release whatever runtime the loaded model lives in.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Loads Bark from the Hugging Face Hub into the model worker.
pub struct HubModelLoader {
    config: EngineConfig,
    bridge: Arc<WorkerBridge>,
}

impl HubModelLoader {
    pub fn new(config: EngineConfig, bridge: Arc<WorkerBridge>) -> Self {
        Self { config, bridge }
    }

    fn try_load(&self, device: Device) -> Result<ModelHandles> {
        let registry = Arc::new(ModelRegistry::new(&self.config)?);

        let config_path = registry.fetch("config.json")?;
        let sample_rate = match registry.fetch_optional("generation_config.json") {
            Some(path) => read_sample_rate(&std::fs::read_to_string(path)?)?,
            None => DEFAULT_SAMPLE_RATE,
        };
        registry.fetch_first(WEIGHT_FILES)?;

        let presets = VoicePresetIndex::load(&registry.fetch(PRESET_INDEX_FILE)?)?;
        info!("{} voice presets available", presets.len());

        let tokenizer_json = registry.fetch_optional("tokenizer.json");
        let vocab_txt = match tokenizer_json {
            Some(_) => None,
            None => registry.fetch_optional("vocab.txt"),
        };
        let tokenizer = Tokenizer::from_files(tokenizer_json.as_deref(), vocab_txt.as_deref())?;

        let snapshot = config_path.parent().ok_or_else(|| {
            Error::ModelLoadError(format!("No snapshot directory for {}", config_path.display()))
        })?;
        let epoch = self.bridge.load_model(snapshot, device)?;

        let processor = BarkProcessor::new(
            tokenizer,
            presets,
            registry,
            self.config.max_text_tokens,
        );
        let generator = BridgeGenerator::new(
            self.bridge.clone(),
            snapshot.to_path_buf(),
            device,
            sample_rate,
            epoch,
        );

        Ok(ModelHandles {
            preprocessor: Box::new(processor),
            generator: Box::new(generator),
        })
    }
}

impl ModelLoader for HubModelLoader {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn load(&self, device: Device) -> Result<ModelHandles> {
        info!("Loading {} on {}", self.config.model_id, device);

        match self.try_load(device) {
            Ok(handles) => {
                info!("Model loaded successfully on {}", device);
                Ok(handles)
            }
            Err(e) => {
                let e = e.into_load_error();
                error!("Error loading model: {}", e);
                Err(e)
            }
        }
    }

    fn shutdown(&self) -> Result<()> {
        self.bridge.shutdown()
    }
}

#[derive(Deserialize)]
struct GenerationConfig {
    sample_rate: Option<u32>,
}

/// Output sample rate from a `generation_config.json` body.
pub fn read_sample_rate(raw: &str) -> Result<u32> {
    let config: GenerationConfig = serde_json::from_str(raw)?;
    match config.sample_rate {
        Some(0) => Err(Error::ModelLoadError(
            "generation_config.json has a zero sample_rate".to_string(),
        )),
        Some(rate) => Ok(rate),
        None => Ok(DEFAULT_SAMPLE_RATE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::bridge::test_support::{crash_worker, fake_worker_config, FAKE_AUDIO};
    use crate::inference::InferenceEngine;
    use crate::model::registry::test_support::seed_cache;
    use crate::voice::VoicePreset;
    use ndarray::{Array1, Array2};
    use ndarray_npy::WriteNpyExt;
    use std::path::Path;

    #[test]
    fn sample_rate_from_generation_config() {
        assert_eq!(read_sample_rate(r#"{"sample_rate": 22050}"#).unwrap(), 22_050);
        assert_eq!(
            read_sample_rate(r#"{"max_input_semantic_length": 256}"#).unwrap(),
            DEFAULT_SAMPLE_RATE
        );
        assert!(matches!(
            read_sample_rate(r#"{"sample_rate": 0}"#),
            Err(Error::ModelLoadError(_))
        ));
    }

    #[test]
    fn missing_artifacts_fail_as_load_error() {
        let dir = tempfile::tempdir().unwrap();
        seed_cache(dir.path(), "suno/bark-small", &[("config.json", b"{}".as_slice())]);

        let config = EngineConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            offline: true,
            python_cmd: "sauti-no-such-python".to_string(),
            ..Default::default()
        };
        let bridge = Arc::new(WorkerBridge::new(&config));
        let loader = HubModelLoader::new(config, bridge);

        match loader.load(Device::Cpu) {
            Err(Error::ModelLoadError(msg)) => assert!(msg.contains("pytorch_model.bin")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("load should fail without weights"),
        }
    }

    const PRESET_INDEX: &str = r#"{
        "repo_or_path": "/",
        "v2/en_speaker_1": {
            "semantic_prompt": "speaker_embeddings/v2/en_speaker_1_semantic_prompt.npy",
            "coarse_prompt": "speaker_embeddings/v2/en_speaker_1_coarse_prompt.npy",
            "fine_prompt": "speaker_embeddings/v2/en_speaker_1_fine_prompt.npy"
        }
    }"#;

    /// A complete local Bark snapshot with one preset and a word-piece vocabulary.
    fn write_snapshot(dir: &Path) {
        let write = |name: &str, contents: &[u8]| {
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        };
        write("config.json", b"{}");
        write("generation_config.json", br#"{"sample_rate": 24000}"#);
        write("model.safetensors", b"weights");
        write(PRESET_INDEX_FILE, PRESET_INDEX.as_bytes());
        write("vocab.txt", b"[PAD]\n[UNK]\nHello\nthere\n");

        let mut semantic = Vec::new();
        Array1::from(vec![5i64, 6, 7]).write_npy(&mut semantic).unwrap();
        let mut coarse = Vec::new();
        Array2::<i64>::zeros((2, 3)).write_npy(&mut coarse).unwrap();
        let mut fine = Vec::new();
        Array2::<i64>::zeros((8, 3)).write_npy(&mut fine).unwrap();
        write("speaker_embeddings/v2/en_speaker_1_semantic_prompt.npy", &semantic);
        write("speaker_embeddings/v2/en_speaker_1_coarse_prompt.npy", &coarse);
        write("speaker_embeddings/v2/en_speaker_1_fine_prompt.npy", &fine);
    }

    fn worker_backed_loader(dir: &Path) -> (EngineConfig, Arc<WorkerBridge>, HubModelLoader) {
        let model_dir = dir.join("bark-small");
        write_snapshot(&model_dir);

        let config = EngineConfig {
            model_id: model_dir.to_string_lossy().to_string(),
            offline: true,
            max_text_tokens: 8,
            ..fake_worker_config(dir)
        };
        let bridge = Arc::new(WorkerBridge::new(&config));
        let loader = HubModelLoader::new(config.clone(), bridge.clone());
        (config, bridge, loader)
    }

    #[test]
    fn loads_snapshot_into_worker() {
        let dir = tempfile::tempdir().unwrap();
        let (_config, bridge, loader) = worker_backed_loader(dir.path());

        let handles = loader.load(Device::Cpu).unwrap();
        assert_eq!(handles.sample_rate(), 24_000);
        assert_eq!(handles.device(), Device::Cpu);
        assert!(bridge.status().unwrap().model_loaded);

        let inputs = handles
            .preprocessor
            .preprocess("Hello there", &VoicePreset::default())
            .unwrap();
        assert!(inputs.get("history_prompt.semantic_prompt").is_some());

        loader.shutdown().unwrap();
    }

    #[tokio::test]
    async fn engine_recovers_from_a_worker_crash() {
        let dir = tempfile::tempdir().unwrap();
        let (config, bridge, loader) = worker_backed_loader(dir.path());
        let engine = InferenceEngine::new(Arc::new(loader), Device::Cpu);

        let wave = engine
            .synthesize("Hello there".to_string(), VoicePreset::default())
            .await
            .unwrap();
        assert_eq!(wave.samples, FAKE_AUDIO.to_vec());

        crash_worker(&config.socket_path);

        for prompt in ["Hello", "there"] {
            let wave = engine
                .synthesize(prompt.to_string(), VoicePreset::default())
                .await
                .unwrap();
            assert_eq!(wave.samples, FAKE_AUDIO.to_vec());
        }
        assert_eq!(bridge.epoch(), 2);

        engine.shutdown().await;
        assert!(!engine.is_loaded());
        assert!(!config.socket_path.exists());
    }
}

//! Voice preset index and history prompts
//!
//! `speaker_embeddings_path.json` maps each preset name to three `.npy` arrays (semantic,
//! coarse and fine history prompts). An optional `repo_or_path` entry names the
//! repository hosting those arrays.

use ndarray::ArrayD;
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::tensor::{ModelInputs, Tensor};
use crate::voice::VoicePreset;

const REPO_KEY: &str = "repo_or_path";

/// Relative paths of one preset's prompt arrays
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PresetFiles {
    pub semantic_prompt: String,
    pub coarse_prompt: String,
    pub fine_prompt: String,
}

#[derive(Debug, Clone, Default)]
pub struct VoicePresetIndex {
    repo: Option<String>,
    presets: HashMap<String, PresetFiles>,
}

impl VoicePresetIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: HashMap<String, serde_json::Value> = serde_json::from_str(raw)?;

        let mut repo = None;
        let mut presets = HashMap::new();
        for (name, value) in entries {
            if name == REPO_KEY {
                repo = value
                    .as_str()
                    .filter(|r| !r.is_empty() && *r != "/")
                    .map(str::to_string);
                continue;
            }
            match serde_json::from_value::<PresetFiles>(value) {
                Ok(files) => {
                    presets.insert(name, files);
                }
                Err(e) => debug!("Skipping preset entry {}: {}", name, e),
            }
        }

        debug!("Indexed {} voice presets", presets.len());
        Ok(Self { repo, presets })
    }

    pub fn get(&self, preset: &VoicePreset) -> Result<&PresetFiles> {
        self.presets
            .get(preset.as_str())
            .ok_or_else(|| Error::UnknownVoicePreset(preset.to_string()))
    }

    /// Repository hosting the prompt arrays, if it differs from the model's.
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

/// Speaker history prompts fed to generation alongside the text
#[derive(Debug, Clone)]
pub struct VoicePrompt {
    pub semantic: Tensor,
    pub coarse: Tensor,
    pub fine: Tensor,
}

impl VoicePrompt {
    pub fn load(semantic: &Path, coarse: &Path, fine: &Path) -> Result<Self> {
        let prompt = Self {
            semantic: read_npy_i64(semantic)?,
            coarse: read_npy_i64(coarse)?,
            fine: read_npy_i64(fine)?,
        };
        prompt.validate()?;
        Ok(prompt)
    }

    fn validate(&self) -> Result<()> {
        for (key, tensor, ndim) in [
            ("semantic_prompt", &self.semantic, 1),
            ("coarse_prompt", &self.coarse, 2),
            ("fine_prompt", &self.fine, 2),
        ] {
            if tensor.ndim() != ndim {
                return Err(Error::GenerationError(format!(
                    "{} must be {}-D, got shape {:?}",
                    key,
                    ndim,
                    tensor.shape()
                )));
            }
        }
        Ok(())
    }

    pub fn insert_into(self, inputs: &mut ModelInputs) {
        inputs.insert("history_prompt.semantic_prompt", self.semantic);
        inputs.insert("history_prompt.coarse_prompt", self.coarse);
        inputs.insert("history_prompt.fine_prompt", self.fine);
    }
}

/// Read an integer `.npy` array as int64, widening int32 data.
pub(crate) fn read_npy_i64(path: &Path) -> Result<Tensor> {
    let bytes = std::fs::read(path)?;
    let array = match ArrayD::<i64>::read_npy(&bytes[..]) {
        Ok(array) => array,
        Err(ReadNpyError::WrongDescriptor(_)) => {
            ArrayD::<i32>::read_npy(&bytes[..])?.mapv(i64::from)
        }
        Err(e) => return Err(e.into()),
    };

    let shape = array.shape().to_vec();
    let data: Vec<i64> = array.iter().copied().collect();
    Tensor::from_i64(shape, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use ndarray_npy::WriteNpyExt;
    use std::fs::File;

    const INDEX: &str = r#"{
        "repo_or_path": "ylacombe/bark-small",
        "v2/en_speaker_1": {
            "semantic_prompt": "speaker_embeddings/v2/en_speaker_1_semantic_prompt.npy",
            "coarse_prompt": "speaker_embeddings/v2/en_speaker_1_coarse_prompt.npy",
            "fine_prompt": "speaker_embeddings/v2/en_speaker_1_fine_prompt.npy"
        }
    }"#;

    #[test]
    fn parses_index_and_repo() {
        let index = VoicePresetIndex::from_json(INDEX).unwrap();
        assert_eq!(index.repo(), Some("ylacombe/bark-small"));
        assert_eq!(index.names(), vec!["v2/en_speaker_1"]);

        let files = index.get(&VoicePreset::default()).unwrap();
        assert!(files.fine_prompt.ends_with("en_speaker_1_fine_prompt.npy"));
    }

    #[test]
    fn unknown_preset_is_reported_by_name() {
        let index = VoicePresetIndex::from_json(INDEX).unwrap();
        match index.get(&VoicePreset::from("v2/xx_speaker_9")) {
            Err(Error::UnknownVoicePreset(name)) => assert_eq!(name, "v2/xx_speaker_9"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn slash_repo_means_same_repository() {
        let index = VoicePresetIndex::from_json(r#"{"repo_or_path": "/"}"#).unwrap();
        assert_eq!(index.repo(), None);
        assert!(index.is_empty());
    }

    #[test]
    fn loads_and_validates_prompt_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let semantic = dir.path().join("semantic.npy");
        let coarse = dir.path().join("coarse.npy");
        let fine = dir.path().join("fine.npy");

        Array1::<i64>::from(vec![10, 11, 12])
            .write_npy(File::create(&semantic).unwrap())
            .unwrap();
        Array2::<i32>::zeros((2, 4))
            .write_npy(File::create(&coarse).unwrap())
            .unwrap();
        Array2::<i64>::ones((8, 4))
            .write_npy(File::create(&fine).unwrap())
            .unwrap();

        let prompt = VoicePrompt::load(&semantic, &coarse, &fine).unwrap();
        assert_eq!(prompt.semantic.shape(), &[3]);
        assert_eq!(prompt.coarse.shape(), &[2, 4]);

        let mut inputs = ModelInputs::new();
        prompt.insert_into(&mut inputs);
        assert!(inputs.get("history_prompt.fine_prompt").is_some());
    }

    #[test]
    fn wrong_rank_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let flat = dir.path().join("flat.npy");
        Array1::<i64>::from(vec![1, 2])
            .write_npy(File::create(&flat).unwrap())
            .unwrap();

        assert!(matches!(
            VoicePrompt::load(&flat, &flat, &flat),
            Err(Error::GenerationError(_))
        ));
    }
}

//! Error types for the Sauti TTS engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Audio generation failed: {0}")]
    GenerationError(String),

    #[error("Unknown voice preset: {0}")]
    UnknownVoicePreset(String),

    #[error("Tokenization error: {0}")]
    TokenizationError(String),

    #[error("Audio encoding error: {0}")]
    AudioError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HuggingFace Hub error: {0}")]
    HfHubError(String),

    #[error("NumPy array error: {0}")]
    NpyError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Fold any failure into a load failure, keeping its message.
    pub fn into_load_error(self) -> Self {
        match self {
            Error::ModelLoadError(_) => self,
            other => Error::ModelLoadError(other.to_string()),
        }
    }

    /// Fold any failure into a generation failure. Unknown presets and a model the
    /// runtime no longer holds stay distinct.
    pub fn into_generation_error(self) -> Self {
        match self {
            Error::GenerationError(_) | Error::UnknownVoicePreset(_) | Error::ModelLoadError(_) => {
                self
            }
            other => Error::GenerationError(other.to_string()),
        }
    }
}

impl From<hf_hub::api::sync::ApiError> for Error {
    fn from(e: hf_hub::api::sync::ApiError) -> Self {
        Error::HfHubError(e.to_string())
    }
}

impl From<ndarray_npy::ReadNpyError> for Error {
    fn from(e: ndarray_npy::ReadNpyError) -> Self {
        Error::NpyError(e.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::AudioError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_keeps_unknown_preset() {
        let err = Error::UnknownVoicePreset("v9/xx_speaker_0".into()).into_generation_error();
        assert!(matches!(err, Error::UnknownVoicePreset(_)));

        let err = Error::TokenizationError("bad input".into()).into_generation_error();
        match err {
            Error::GenerationError(msg) => assert!(msg.contains("bad input")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn generation_error_keeps_lost_model() {
        let err = Error::ModelLoadError("model is not loaded".into()).into_generation_error();
        match err {
            Error::ModelLoadError(msg) => assert_eq!(msg, "model is not loaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_error_wraps_hub_failures() {
        let err = Error::HfHubError("404".into()).into_load_error();
        assert!(matches!(err, Error::ModelLoadError(_)));
    }
}

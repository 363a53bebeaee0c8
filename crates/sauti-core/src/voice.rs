//! Voice preset identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Preset used when a request names none.
pub const DEFAULT_VOICE_PRESET: &str = "v2/en_speaker_1";

/// Opaque speaker/style identifier understood by the model, e.g. `v2/en_speaker_1`.
///
/// No validation happens here; the preprocessor rejects names it does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoicePreset(String);

impl VoicePreset {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoicePreset {
    fn default() -> Self {
        Self(DEFAULT_VOICE_PRESET.to_string())
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoicePreset {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

//! Configuration types for the Sauti TTS engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::device::DevicePreference;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hugging Face repository of the pretrained model
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Override for the Hugging Face cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Resolve model files from the local cache only
    #[serde(default)]
    pub offline: bool,

    /// Device preference: auto, cuda, cuda:N, mps or cpu
    #[serde(default)]
    pub device: DevicePreference,

    /// Python interpreter used to run the model worker
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,

    /// Path to the model worker script
    #[serde(default = "default_worker_script")]
    pub worker_script: PathBuf,

    /// Unix socket the worker listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// How long to wait for the worker socket to come up
    #[serde(default = "default_worker_startup_timeout_secs")]
    pub worker_startup_timeout_secs: u64,

    /// Fixed text length fed to the model (tokens)
    #[serde(default = "default_max_text_tokens")]
    pub max_text_tokens: usize,

    /// Load the model at startup instead of on the first request
    #[serde(default = "default_preload")]
    pub preload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            cache_dir: None,
            offline: false,
            device: DevicePreference::default(),
            python_cmd: default_python_cmd(),
            worker_script: default_worker_script(),
            socket_path: default_socket_path(),
            worker_startup_timeout_secs: default_worker_startup_timeout_secs(),
            max_text_tokens: default_max_text_tokens(),
            preload: default_preload(),
        }
    }
}

fn default_model_id() -> String {
    "suno/bark-small".to_string()
}

fn default_python_cmd() -> String {
    "python3".to_string()
}

fn default_worker_script() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("scripts")
        .join("bark_worker.py")
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("sauti_bark_worker.sock")
}

fn default_worker_startup_timeout_secs() -> u64 {
    120
}

fn default_max_text_tokens() -> usize {
    256
}

fn default_preload() -> bool {
    true
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// Size of each chunk of the streamed WAV body
    #[serde(default = "default_stream_chunk_bytes")]
    pub stream_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_cors_enabled(),
            stream_chunk_bytes: default_stream_chunk_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_enabled() -> bool {
    true
}

fn default_stream_chunk_bytes() -> usize {
    16 * 1024
}

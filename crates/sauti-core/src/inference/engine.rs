//! Process-wide inference engine.
//!
//! Holds the device chosen at startup and the model handles, loaded once on first use
//! and shared by every request. Loads are serialized apart from the handle slot so
//! readers never wait on a load in progress. Generation calls are serialized on the
//! device.

use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::inference::generation::{generate_audio, Waveform};
use crate::model::{ModelHandles, ModelLoader};
use crate::voice::VoicePreset;

pub struct InferenceEngine {
    loader: Arc<dyn ModelLoader>,
    device: Device,
    model: RwLock<Option<Arc<ModelHandles>>>,
    load_lock: tokio::sync::Mutex<()>,
    device_lock: Arc<Mutex<()>>,
}

impl InferenceEngine {
    pub fn new(loader: Arc<dyn ModelLoader>, device: Device) -> Self {
        Self {
            loader,
            device,
            model: RwLock::new(None),
            load_lock: tokio::sync::Mutex::new(()),
            device_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_id(&self) -> &str {
        self.loader.model_id()
    }

    /// Whether handles are loaded. Never waits; a slot being swapped reads as unloaded.
    pub fn is_loaded(&self) -> bool {
        self.model
            .try_read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    async fn loaded(&self) -> Option<Arc<ModelHandles>> {
        self.model.read().await.clone()
    }

    /// Loaded model handles, loading them if this is the first use.
    ///
    /// A failed load leaves the slot empty so the next caller retries.
    pub async fn model(&self) -> Result<Arc<ModelHandles>> {
        if let Some(handles) = self.loaded().await {
            return Ok(handles);
        }

        let _loading = self.load_lock.lock().await;
        if let Some(handles) = self.loaded().await {
            return Ok(handles);
        }

        let loader = self.loader.clone();
        let device = self.device;
        let handles = tokio::task::spawn_blocking(move || loader.load(device))
            .await
            .map_err(|e| Error::ModelLoadError(e.to_string()))??;

        let handles = Arc::new(handles);
        *self.model.write().await = Some(handles.clone());
        Ok(handles)
    }

    /// Drop `stale` from the slot unless another caller already replaced it.
    async fn discard(&self, stale: &Arc<ModelHandles>) {
        let mut slot = self.model.write().await;
        if slot.as_ref().is_some_and(|handles| Arc::ptr_eq(handles, stale)) {
            slot.take();
        }
    }

    /// Load the model ahead of the first request.
    pub async fn preload(&self) -> Result<()> {
        info!("Preloading {} on {}", self.model_id(), self.device);
        self.model().await.map(|_| ())
    }

    /// Synthesize `prompt` with `preset` on the shared model.
    ///
    /// If the runtime reports it no longer holds the model, the handles are reloaded
    /// and the request is tried once more.
    pub async fn synthesize(&self, prompt: String, preset: VoicePreset) -> Result<Waveform> {
        let handles = self.model().await?;
        match self
            .generate(handles.clone(), prompt.clone(), preset.clone())
            .await
        {
            Err(Error::ModelLoadError(e)) => {
                warn!("Model runtime lost the model ({}), reloading", e);
                self.discard(&handles).await;
                let handles = self.model().await?;
                self.generate(handles, prompt, preset).await
            }
            result => result,
        }
    }

    async fn generate(
        &self,
        handles: Arc<ModelHandles>,
        prompt: String,
        preset: VoicePreset,
    ) -> Result<Waveform> {
        let device_lock = self.device_lock.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = device_lock.lock().unwrap_or_else(|e| e.into_inner());
            generate_audio(
                handles.preprocessor.as_ref(),
                handles.generator.as_ref(),
                &prompt,
                &preset,
            )
        })
        .await
        .map_err(|e| Error::GenerationError(e.to_string()))?
    }

    /// Release the model runtime.
    pub async fn shutdown(&self) {
        let loader = self.loader.clone();
        match tokio::task::spawn_blocking(move || loader.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to stop model runtime: {}", e),
            Err(e) => error!("Model runtime shutdown task failed: {}", e),
        }
        self.model.write().await.take();
    }
}

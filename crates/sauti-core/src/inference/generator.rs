//! Generation capability backed by the model worker

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::device::Device;
use crate::error::Result;
use crate::inference::bridge::WorkerBridge;
use crate::inference::generation::{GenerationOptions, Generator};
use crate::tensor::{ModelInputs, Tensor};

/// Handle to a model the worker has loaded onto `device`
///
/// A restarted worker comes up empty, so the model is loaded into it again from
/// `model_path` before the next generation.
pub struct BridgeGenerator {
    bridge: Arc<WorkerBridge>,
    model_path: PathBuf,
    device: Device,
    sample_rate: u32,
    loaded_epoch: AtomicU64,
}

impl BridgeGenerator {
    /// `epoch` is the one [`WorkerBridge::load_model`] returned for `model_path`.
    pub fn new(
        bridge: Arc<WorkerBridge>,
        model_path: PathBuf,
        device: Device,
        sample_rate: u32,
        epoch: u64,
    ) -> Self {
        Self {
            bridge,
            model_path,
            device,
            sample_rate,
            loaded_epoch: AtomicU64::new(epoch),
        }
    }

    fn ensure_model(&self) -> Result<()> {
        let restarted = self.bridge.ensure_running()?;
        if restarted || self.bridge.epoch() != self.loaded_epoch.load(Ordering::SeqCst) {
            warn!(
                "Model worker restarted, reloading {} on {}",
                self.model_path.display(),
                self.device
            );
            let epoch = self.bridge.load_model(&self.model_path, self.device)?;
            self.loaded_epoch.store(epoch, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Generator for BridgeGenerator {
    fn device(&self) -> Device {
        self.device
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn generate(&self, inputs: ModelInputs, options: &GenerationOptions) -> Result<Tensor> {
        self.ensure_model()?;
        self.bridge.generate(&inputs, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::bridge::test_support::{crash_worker, fake_worker_config, FAKE_AUDIO};

    #[test]
    fn reloads_model_into_a_restarted_worker() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_worker_config(dir.path());
        let bridge = Arc::new(WorkerBridge::new(&config));

        let epoch = bridge.load_model(dir.path(), Device::Cpu).unwrap();
        let generator = BridgeGenerator::new(
            bridge.clone(),
            dir.path().to_path_buf(),
            Device::Cpu,
            24_000,
            epoch,
        );

        let options = GenerationOptions::sampling();
        let audio = generator.generate(ModelInputs::new(), &options).unwrap();
        assert_eq!(audio.into_f32_vec().unwrap(), FAKE_AUDIO.to_vec());

        crash_worker(&config.socket_path);

        let audio = generator.generate(ModelInputs::new(), &options).unwrap();
        assert_eq!(audio.into_f32_vec().unwrap(), FAKE_AUDIO.to_vec());
        assert_eq!(bridge.epoch(), 2);
        assert!(bridge.status().unwrap().model_loaded);

        bridge.shutdown().unwrap();
    }
}

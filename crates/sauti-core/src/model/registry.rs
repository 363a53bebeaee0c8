//! Model file resolution against the Hugging Face Hub

use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Cache, Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Resolves repository files to local paths, downloading on a cache miss.
pub struct ModelRegistry {
    model_id: String,
    cache: Cache,
    api: Option<Api>,
}

impl ModelRegistry {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let cache = match &config.cache_dir {
            Some(dir) => Cache::new(dir.clone()),
            None => Cache::default(),
        };

        let api = if config.offline {
            None
        } else {
            let mut builder = ApiBuilder::new().with_progress(false);
            if let Some(dir) = &config.cache_dir {
                builder = builder.with_cache_dir(dir.clone());
            }
            Some(builder.build()?)
        };

        Ok(Self {
            model_id: config.model_id.clone(),
            cache,
            api,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Resolve a file of the configured model.
    pub fn fetch(&self, filename: &str) -> Result<PathBuf> {
        self.fetch_from(&self.model_id, filename)
    }

    /// Resolve a file of any model repository. A `repo_id` naming an existing
    /// directory is read in place.
    pub fn fetch_from(&self, repo_id: &str, filename: &str) -> Result<PathBuf> {
        let local = Path::new(repo_id);
        if local.is_dir() {
            let path = local.join(filename);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(Error::HfHubError(format!(
                    "{} not found in {}",
                    filename,
                    local.display()
                )))
            };
        }

        let repo = Repo::new(repo_id.to_string(), RepoType::Model);

        if let Some(path) = self.cache.repo(repo.clone()).get(filename) {
            debug!("Cache hit for {}/{}", repo_id, filename);
            return Ok(path);
        }

        match &self.api {
            Some(api) => {
                debug!("Fetching {}/{} from the hub", repo_id, filename);
                Ok(api.repo(repo).get(filename)?)
            }
            None => Err(Error::HfHubError(format!(
                "{}/{} is not in the local cache and offline mode is on",
                repo_id, filename
            ))),
        }
    }

    /// Resolve the first candidate that exists.
    pub fn fetch_first(&self, candidates: &[&str]) -> Result<PathBuf> {
        let mut last_err = None;
        for name in candidates {
            match self.fetch(name) {
                Ok(path) => return Ok(path),
                Err(e) => {
                    debug!("{} unavailable: {}", name, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::HfHubError("No candidate files given".to_string())))
    }

    /// Resolve a file that the model may legitimately lack.
    pub fn fetch_optional(&self, filename: &str) -> Option<PathBuf> {
        self.fetch(filename).ok()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Lay files out the way the hub cache does for `repo_id` at revision `main`.
    pub fn seed_cache(root: &Path, repo_id: &str, files: &[(&str, &[u8])]) {
        let repo_dir = root.join(format!("models--{}", repo_id.replace('/', "--")));
        let commit = "0123456789abcdef";
        std::fs::create_dir_all(repo_dir.join("refs")).unwrap();
        std::fs::write(repo_dir.join("refs").join("main"), commit).unwrap();

        let snapshot = repo_dir.join("snapshots").join(commit);
        for (name, contents) in files {
            let path = snapshot.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::seed_cache;
    use super::*;

    fn offline_config(cache_dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            model_id: "suno/bark-small".to_string(),
            cache_dir: Some(cache_dir.to_path_buf()),
            offline: true,
            ..Default::default()
        }
    }

    #[test]
    fn offline_lookup_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        seed_cache(dir.path(), "suno/bark-small", &[("config.json", b"{}".as_slice())]);

        let registry = ModelRegistry::new(&offline_config(dir.path())).unwrap();
        let path = registry.fetch("config.json").unwrap();
        assert!(path.ends_with("config.json"));
    }

    #[test]
    fn offline_miss_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(&offline_config(dir.path())).unwrap();
        assert!(matches!(
            registry.fetch("config.json"),
            Err(Error::HfHubError(_))
        ));
        assert!(registry.fetch_optional("tokenizer.json").is_none());
    }

    #[test]
    fn local_directory_is_read_in_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let config = EngineConfig {
            model_id: dir.path().to_string_lossy().to_string(),
            offline: true,
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config).unwrap();
        assert_eq!(
            registry.fetch("config.json").unwrap(),
            dir.path().join("config.json")
        );
        assert!(registry.fetch("vocab.txt").is_err());
    }

    #[test]
    fn first_available_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        seed_cache(dir.path(), "suno/bark-small", &[("pytorch_model.bin", b"weights".as_slice())]);

        let registry = ModelRegistry::new(&offline_config(dir.path())).unwrap();
        let path = registry
            .fetch_first(&["model.safetensors", "pytorch_model.bin"])
            .unwrap();
        assert!(path.ends_with("pytorch_model.bin"));
    }
}

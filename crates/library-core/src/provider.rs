//! Pluggable embedding and text-generation capabilities
//!
//! The engine never calls an embedding model or an LLM directly; it depends
//! on these two trait objects, supplied by the host application. This keeps
//! the crate free of any particular model runtime or API client beyond the
//! optional local [`LocalEmbeddingProvider`].

use async_trait::async_trait;

/// Turns text into a unit-length embedding vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`, returning a unit-length vector. The dimension is fixed
    /// for the lifetime of a given provider.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed a batch of texts. The default implementation calls
    /// [`Self::embed`] once per text; providers backed by a batching API
    /// should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Dimension of the vectors this provider produces, if known up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Generates text from a prompt, used for compendium summarization,
/// librarian bidding/arbitration, and specialist proposal.
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Failure surfaced by an [`EmbeddingProvider`] or [`TextGenerationProvider`].
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),
}

#[cfg(feature = "embeddings")]
pub use local::LocalEmbeddingProvider;

#[cfg(feature = "embeddings")]
mod local {
    //! Local, offline [`EmbeddingProvider`] backed by `fastembed` (ONNX).
    //! No network calls at inference time; model weights are downloaded
    //! once and cached under the platform cache directory (or
    //! `FASTEMBED_CACHE_PATH`, if set).

    use std::sync::Mutex;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{EmbeddingProvider, ProviderError};

    const DIMENSIONS: usize = 768;

    fn cache_dir() -> std::path::PathBuf {
        if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
            return std::path::PathBuf::from(path);
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("org", "library-core", "library-core") {
            return proj_dirs.cache_dir().join("fastembed");
        }
        std::path::PathBuf::from(".fastembed_cache")
    }

    pub struct LocalEmbeddingProvider {
        model: Mutex<TextEmbedding>,
    }

    impl LocalEmbeddingProvider {
        /// Download (if needed) and initialize the local embedding model.
        pub fn new() -> Result<Self, ProviderError> {
            let dir = cache_dir();
            if let Err(e) = std::fs::create_dir_all(&dir) {
                tracing::warn!(?dir, error = %e, "failed to create fastembed cache directory");
            }

            let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
                .with_show_download_progress(true)
                .with_cache_dir(dir);

            let model = TextEmbedding::try_new(options)
                .map_err(|e| ProviderError::Failed(format!("model init: {e}")))?;

            Ok(Self {
                model: Mutex::new(model),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LocalEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let text = text.to_string();
            let mut model = self
                .model
                .lock()
                .map_err(|_| ProviderError::Failed("embedding model lock poisoned".into()))?;
            let mut vectors = model
                .embed(vec![text], None)
                .map_err(|e| ProviderError::Failed(e.to_string()))?;
            let mut vector = vectors.pop().ok_or_else(|| {
                ProviderError::Failed("embedding model returned no vectors".into())
            })?;
            normalize(&mut vector);
            Ok(vector)
        }

        fn dimension(&self) -> Option<usize> {
            Some(DIMENSIONS)
        }
    }

    fn normalize(vector: &mut [f32]) {
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector {
                *x /= norm;
            }
        }
    }
}

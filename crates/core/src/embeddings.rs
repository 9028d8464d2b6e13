use crate::error::EmbedError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Turns text into fixed-width vectors.
///
/// `encode` must return exactly one row per input, in input order, each row
/// `dimensions()` wide.
pub trait Embedder {
    fn dimensions(&self) -> usize;

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.encode(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Backend("embedder returned no vector".to_string()))
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).encode(texts)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        normalize(&mut vector);
        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

pub fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector {
            *value /= magnitude;
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    endpoint: Url,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbedError> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("embeddings")?;

        Ok(Self {
            endpoint,
            model: config.model,
            dimensions: config.dimensions,
            api_key: config.api_key,
            client: Client::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(EmbedError::Backend(format!(
                "embedding request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: EmbeddingResponse = response.json()?;
        rows_in_input_order(payload, texts.len(), self.dimensions)
    }
}

fn rows_in_input_order(
    payload: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if payload.data.len() != expected {
        return Err(EmbedError::Backend(format!(
            "expected {expected} embeddings, got {}",
            payload.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, row) in payload.data.into_iter().enumerate() {
        let index = row.index.unwrap_or(position);
        if row.embedding.len() != dimensions {
            return Err(EmbedError::Backend(format!(
                "embedding {index} has dimension {}, expected {dimensions}",
                row.embedding.len()
            )));
        }
        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(row.embedding),
            _ => {
                return Err(EmbedError::Backend(format!(
                    "embedding index {index} is out of range or repeated"
                )))
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| EmbedError::Backend("embedding response has gaps".to_string()))
        })
        .collect()
}

#[cfg(feature = "local-embed")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embed")]
mod local {
    use super::Embedder;
    use crate::error::EmbedError;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;
    use tracing::{debug, info};

    pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

    /// Local ONNX sentence model, loaded once per embedder.
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        model_name: String,
        dimensions: usize,
    }

    impl FastEmbedder {
        pub fn new(model_name: &str) -> Result<Self, EmbedError> {
            info!(model = model_name, "loading local embedding model");

            let (model_enum, dimensions) = match model_name {
                "BAAI/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
                "BAAI/bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
                "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
                    (EmbeddingModel::AllMiniLML6V2, 384)
                }
                other => {
                    return Err(EmbedError::Model(format!(
                        "unsupported local model '{other}'"
                    )))
                }
            };

            let options = InitOptions::new(model_enum).with_show_download_progress(true);
            let model = TextEmbedding::try_new(options)
                .map_err(|error| EmbedError::Model(format!("failed to load model: {error}")))?;

            Ok(Self {
                model: Mutex::new(model),
                model_name: model_name.to_string(),
                dimensions,
            })
        }

        pub fn default_model() -> Result<Self, EmbedError> {
            Self::new(DEFAULT_LOCAL_MODEL)
        }

        pub fn model_name(&self) -> &str {
            &self.model_name
        }
    }

    impl Embedder for FastEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            debug!(count = texts.len(), "embedding texts locally");
            #[allow(unused_mut)]
            let mut model = self
                .model
                .lock()
                .map_err(|_| EmbedError::Model("embedding model lock poisoned".to_string()))?;

            model
                .embed(texts.to_vec(), None)
                .map_err(|error| EmbedError::Model(format!("embedding failed: {error}")))
        }
    }

}

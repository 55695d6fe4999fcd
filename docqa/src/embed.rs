use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::post_json;

/// Text embedding backend used for both report chunks and questions.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vecs = self.embed(&[text.to_string()])?;
        Ok(vecs.into_iter().next().unwrap_or_default())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/embeddings` client.
#[derive(Clone, Debug)]
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(&cfg.openai_base_url, cfg.api_key()?, &cfg.embed_model))
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let req = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let res = post_json::<EmbedResponse, _>(&url, Some(&self.api_key), &req)?;
        if res.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                res.data.len()
            )));
        }
        Ok(res.data.into_iter().map(|d| d.embedding).collect())
    }
}

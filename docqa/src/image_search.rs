use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::file_format::is_allowed_format;
use crate::http::post_json;
use crate::report_store::UploadedFile;
use crate::similarity::top_k;

/// An uploaded image, held in memory only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub data: Arc<[u8]>,
}

impl From<&UploadedFile> for ImageRef {
    fn from(file: &UploadedFile) -> Self {
        Self {
            name: file.name.clone(),
            data: Arc::clone(&file.content),
        }
    }
}

/// Picks the image files out of an upload batch.
pub fn filter_images<S: AsRef<str>>(files: &[UploadedFile], image_exts: &[S]) -> Vec<ImageRef> {
    files
        .iter()
        .filter(|f| is_allowed_format(Some(f.name.as_str()), image_exts))
        .map(ImageRef::from)
        .collect()
}

/// Embeds text and images into one shared vector space.
pub trait ImageEmbedder: Send + Sync {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_images(&self, images: &[ImageRef]) -> Result<Vec<Vec<f32>>>;
}

/// Ranks `images` by similarity to `query` and keeps the best `k`.
/// No images means no embedding calls and an empty result.
pub fn rank_images(
    embedder: &dyn ImageEmbedder,
    query: &str,
    images: &[ImageRef],
    k: usize,
) -> Result<Vec<ImageRef>> {
    if images.is_empty() || k == 0 {
        return Ok(vec![]);
    }
    let query_vec = embedder.embed_text(query)?;
    let image_vecs = embedder.embed_images(images)?;
    if image_vecs.len() != images.len() {
        return Err(Error::Embedding(format!(
            "{} images but {} embeddings",
            images.len(),
            image_vecs.len()
        )));
    }
    let ranked = top_k(&query_vec, &image_vecs, k);
    debug!(?ranked, "ranked report images");
    Ok(ranked.into_iter().map(|(i, _)| images[i].clone()).collect())
}

#[derive(Serialize)]
#[serde(untagged)]
enum ClipInput {
    Text { text: String },
    Image { image: String },
}

#[derive(Serialize)]
struct ClipRequest<'a> {
    model: &'a str,
    input: Vec<ClipInput>,
}

#[derive(Deserialize)]
struct ClipResponse {
    data: Vec<ClipData>,
}

#[derive(Deserialize)]
struct ClipData {
    embedding: Vec<f32>,
}

/// CLIP-style multimodal embeddings over an OpenAI-shaped `/embeddings` API
/// that accepts `{"text": ..}` and base64 `{"image": ..}` inputs.
#[derive(Clone, Debug)]
pub struct ClipClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ClipClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.clip_base_url, cfg.clip_api_key.clone(), &cfg.clip_model)
    }

    fn embed(&self, input: Vec<ClipInput>) -> Result<Vec<Vec<f32>>> {
        let expected = input.len();
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let req = ClipRequest {
            model: &self.model,
            input,
        };
        let res = post_json::<ClipResponse, _>(&url, self.api_key.as_deref(), &req)?;
        if res.data.len() != expected {
            return Err(Error::Embedding(format!(
                "asked for {} embeddings, got {}",
                expected,
                res.data.len()
            )));
        }
        Ok(res.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl ImageEmbedder for ClipClient {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let vecs = self.embed(vec![ClipInput::Text {
            text: text.to_string(),
        }])?;
        Ok(vecs.into_iter().next().unwrap_or_default())
    }

    fn embed_images(&self, images: &[ImageRef]) -> Result<Vec<Vec<f32>>> {
        let input = images
            .iter()
            .map(|img| ClipInput::Image {
                image: BASE64_STANDARD.encode(&img.data),
            })
            .collect();
        self.embed(input)
    }
}

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub document_exts: Vec<String>,
    pub image_exts: Vec<String>,
    pub upload_exts: Vec<String>,
    pub max_file_bytes: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub image_top_k: usize,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub clip_base_url: String,
    pub clip_model: String,
    pub clip_api_key: Option<String>,
    pub system_prompt: String,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            document_exts: split_list(crate::file_format::DOCUMENT_FORMATS),
            image_exts: split_list(crate::file_format::IMAGE_FORMATS),
            upload_exts: split_list(crate::file_format::UPLOAD_FORMATS),
            max_file_bytes: 20_000_000,
            chunk_size: 2048,
            chunk_overlap: 200,
            top_k: 4,
            image_top_k: 2,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            clip_base_url: "https://api.jina.ai/v1".to_string(),
            clip_model: "jina-clip-v1".to_string(),
            clip_api_key: None,
            system_prompt: "You are an assistant for doctors. Answer questions about the \
                patient reports using only the provided context."
                .to_string(),
            log_file: PathBuf::from("docagent.log"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env if present so the API key works without manual `export`.
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        Self {
            data_dir: env::var("DOCAGENT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            document_exts: env::var("DOCAGENT_DOCUMENT_EXTS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.document_exts),
            image_exts: env::var("DOCAGENT_IMAGE_EXTS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.image_exts),
            upload_exts: env::var("DOCAGENT_UPLOAD_EXTS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.upload_exts),
            max_file_bytes: parse_var("DOCAGENT_MAX_FILE_BYTES").unwrap_or(defaults.max_file_bytes),
            chunk_size: parse_var("DOCAGENT_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_var("DOCAGENT_CHUNK_OVERLAP").unwrap_or(defaults.chunk_overlap),
            top_k: parse_var("DOCAGENT_TOP_K").unwrap_or(defaults.top_k),
            image_top_k: parse_var("DOCAGENT_IMAGE_TOP_K").unwrap_or(defaults.image_top_k),
            openai_api_key: non_blank_var("OPENAI_API_KEY"),
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            chat_model: env::var("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embed_model: env::var("OPENAI_EMBED_MODEL").unwrap_or(defaults.embed_model),
            clip_base_url: env::var("CLIP_BASE_URL").unwrap_or(defaults.clip_base_url),
            clip_model: env::var("CLIP_MODEL").unwrap_or(defaults.clip_model),
            clip_api_key: non_blank_var("CLIP_API_KEY"),
            system_prompt: env::var("DOCAGENT_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            log_file: env::var("DOCAGENT_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        }
    }

    /// The text backend credential. Startup must check this before accepting queries.
    pub fn api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingApiKey)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

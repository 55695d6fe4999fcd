use serde::{Deserialize, Serialize};

use crate::build_prompt::Message;
use crate::config::Config;
use crate::error::Result;
use crate::http::post_json;

/// Text generation backend. An empty string means "no answer".
pub trait ChatModel: Send + Sync {
    fn complete(&self, messages: &[Message]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone, Debug)]
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(&cfg.openai_base_url, cfg.api_key()?, &cfg.chat_model))
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let res = post_json::<ChatResponse, _>(&url, Some(&self.api_key), &req)?;
        Ok(res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

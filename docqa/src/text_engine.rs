use std::path::Path;

use tracing::{debug, info};

use crate::build_prompt::{build_prompt_with_context, Hit};
use crate::chunk_text::chunk_text;
use crate::config::Config;
use crate::embed::{Embedder, OpenAiEmbedder};
use crate::error::{Error, Result};
use crate::generate::{ChatModel, OpenAiChat};
use crate::scan_files::scan_files;
use crate::similarity::top_k;

/// Returned whenever the engine has nothing to say.
pub const FALLBACK_ANSWER: &str = "Sorry I can't help you with that. Try rephrasing your question.";

#[derive(Clone, Debug, PartialEq)]
pub struct IndexedChunk {
    pub source: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Searchable embeddings for one upload batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentIndex {
    chunks: Vec<IndexedChunk>,
}

impl DocumentIndex {
    pub fn new(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    /// The `k` chunks closest to `query_vec`, best first.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<Hit> {
        let vectors: Vec<&[f32]> = self.chunks.iter().map(|c| c.vector.as_slice()).collect();
        top_k(query_vec, &vectors, k)
            .into_iter()
            .map(|(i, score)| Hit {
                source: self.chunks[i].source.clone(),
                chunk: self.chunks[i].text.clone(),
                score,
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct TextEngineOptions {
    pub document_exts: Vec<String>,
    pub max_file_bytes: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub system_prompt: String,
}

impl From<&Config> for TextEngineOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            document_exts: cfg.document_exts.clone(),
            max_file_bytes: cfg.max_file_bytes,
            chunk_size: cfg.chunk_size,
            chunk_overlap: cfg.chunk_overlap,
            top_k: cfg.top_k,
            system_prompt: cfg.system_prompt.clone(),
        }
    }
}

/// Retrieval-augmented answering over the persisted reports.
pub struct TextEngine {
    embedder: Box<dyn Embedder>,
    chat: Box<dyn ChatModel>,
    options: TextEngineOptions,
}

impl TextEngine {
    pub fn new(embedder: Box<dyn Embedder>, chat: Box<dyn ChatModel>, options: TextEngineOptions) -> Self {
        Self {
            embedder,
            chat,
            options,
        }
    }

    /// OpenAI-backed engine. Fails when no API key is configured.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(
            Box::new(OpenAiEmbedder::from_config(cfg)?),
            Box::new(OpenAiChat::from_config(cfg)?),
            TextEngineOptions::from(cfg),
        ))
    }

    /// Embeds every extractable report in `documents_dir`. An empty or missing
    /// directory gives an empty index.
    pub fn build_index(&self, documents_dir: &Path) -> Result<DocumentIndex> {
        let docs = scan_files(documents_dir, &self.options.document_exts, self.options.max_file_bytes);
        let mut chunks = Vec::new();

        for doc in docs {
            let pieces = chunk_text(&doc.text, self.options.chunk_size, self.options.chunk_overlap);
            if pieces.is_empty() {
                continue;
            }
            let vectors = self.embedder.embed(&pieces)?;
            if vectors.len() != pieces.len() {
                return Err(Error::Embedding(format!(
                    "{}: {} chunks but {} vectors",
                    doc.path,
                    pieces.len(),
                    vectors.len()
                )));
            }
            for (text, vector) in pieces.into_iter().zip(vectors) {
                chunks.push(IndexedChunk {
                    source: doc.path.clone(),
                    text,
                    vector,
                });
            }
        }

        info!(dir = %documents_dir.display(), chunks = chunks.len(), "built report index");
        Ok(DocumentIndex::new(chunks))
    }

    /// Answers `question` from `index`, or [`FALLBACK_ANSWER`] when there is
    /// nothing to answer from or the model returns nothing.
    pub fn query(&self, index: &DocumentIndex, question: &str) -> Result<String> {
        if index.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }
        let query_vec = self.embedder.embed_one(question)?;
        let hits = index.search(&query_vec, self.options.top_k);
        debug!(
            hits = hits.len(),
            best = hits.first().map(|h| h.score).unwrap_or_default(),
            "retrieved report chunks"
        );
        let messages = build_prompt_with_context(&self.options.system_prompt, question, &hits);
        let answer = self.chat.complete(&messages)?;
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(FALLBACK_ANSWER.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

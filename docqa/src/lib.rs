//! Question answering over uploaded patient reports.
//!
//! Uploaded documents are persisted to a working directory and indexed for
//! retrieval-augmented answers; uploaded images stay in memory and are
//! searched by text-image similarity. [`Orchestrator::handle_query`] routes
//! each question with [`classify`] and appends the result to a [`Session`].

mod build_prompt;
mod chunk_text;
mod config;
mod conversation;
mod embed;
mod error;
mod file_format;
mod generate;
mod http;
mod image_search;
mod orchestrator;
mod prompt_router;
mod report_store;
mod scan_files;
mod similarity;
mod text_engine;

pub use build_prompt::{build_prompt_with_context, format_context_from_hits, Hit, Message};
pub use chunk_text::chunk_text;
pub use config::Config;
pub use conversation::{ConversationTurn, IndexState, Response, ResponseKind, Session, GREETING};
pub use embed::{Embedder, OpenAiEmbedder};
pub use error::{Error, Result};
pub use file_format::{extension, is_allowed_format, DOCUMENT_FORMATS, IMAGE_FORMATS, UPLOAD_FORMATS};
pub use generate::{ChatModel, OpenAiChat};
pub use image_search::{filter_images, rank_images, ClipClient, ImageEmbedder, ImageRef};
pub use orchestrator::Orchestrator;
pub use prompt_router::{classify, PromptKind};
pub use report_store::{reset_and_persist, FileReport, PersistOutcome, PersistReport, UploadedFile};
pub use scan_files::{extract_text, scan_files, SourceDocument};
pub use similarity::{cosine_similarity, top_k};
pub use text_engine::{DocumentIndex, IndexedChunk, TextEngine, TextEngineOptions, FALLBACK_ANSWER};

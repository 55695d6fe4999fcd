use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::conversation::{ConversationTurn, IndexState, Response, Session};
use crate::error::{Error, Result};
use crate::image_search::{filter_images, rank_images, ClipClient, ImageEmbedder};
use crate::prompt_router::{classify, PromptKind};
use crate::report_store::{reset_and_persist, PersistReport, UploadedFile};
use crate::text_engine::TextEngine;

/// Wires upload batches and queries to the engines behind them.
pub struct Orchestrator {
    text: TextEngine,
    images: Box<dyn ImageEmbedder>,
    data_dir: PathBuf,
    document_exts: Vec<String>,
    image_exts: Vec<String>,
    image_top_k: usize,
}

impl Orchestrator {
    pub fn new(text: TextEngine, images: Box<dyn ImageEmbedder>, cfg: &Config) -> Self {
        Self {
            text,
            images,
            data_dir: cfg.data_dir.clone(),
            document_exts: cfg.document_exts.clone(),
            image_exts: cfg.image_exts.clone(),
            image_top_k: cfg.image_top_k,
        }
    }

    /// OpenAI text engine plus CLIP image search. Fails fast without an API key.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(
            TextEngine::from_config(cfg)?,
            Box::new(ClipClient::from_config(cfg)),
            cfg,
        ))
    }

    /// Replaces the working directory with `files` and indexes it once.
    /// An index build failure is kept in the session rather than returned,
    /// so image questions still work and text questions report it.
    pub fn start_session(&self, files: Vec<UploadedFile>) -> Result<(Session, PersistReport)> {
        let report = reset_and_persist(&self.data_dir, &files, &self.document_exts)?;
        let index = match self.text.build_index(&self.data_dir) {
            Ok(index) => IndexState::Ready(index),
            Err(err) => {
                warn!(error = %err, "report index build failed");
                IndexState::Failed(err.to_string())
            }
        };
        info!(
            files = files.len(),
            written = report.written().count(),
            "started session"
        );
        Ok((Session::new(files, index), report))
    }

    /// Routes `query`, answers it and appends exactly one turn to `session`.
    pub fn handle_query<'s>(&self, query: &str, session: &'s mut Session) -> &'s ConversationTurn {
        let route = classify(query);
        info!(%route, "routing query");

        let response = match self.answer(route, query, session) {
            Ok(response) => response,
            Err(err) => {
                warn!(%route, error = %err, "query failed");
                Response::Error(err.to_string())
            }
        };

        session.push_turn(ConversationTurn {
            query: query.to_string(),
            route,
            response,
        })
    }

    fn answer(&self, route: PromptKind, query: &str, session: &Session) -> Result<Response> {
        match route {
            PromptKind::Text => {
                let index = match session.index() {
                    IndexState::Ready(index) => index,
                    IndexState::Failed(msg) => return Err(Error::Index(msg.clone())),
                };
                Ok(Response::Text(self.text.query(index, query)?))
            }
            PromptKind::Image => {
                let candidates = filter_images(session.files(), &self.image_exts);
                let ranked = rank_images(&*self.images, query, &candidates, self.image_top_k)?;
                Ok(Response::Images(ranked))
            }
        }
    }
}

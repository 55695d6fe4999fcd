use crate::image_search::ImageRef;
use crate::prompt_router::PromptKind;
use crate::report_store::UploadedFile;
use crate::text_engine::DocumentIndex;

pub const GREETING: &str = "Hello Doc! I am here to answer questions from the provided patient reports.";

/// The kind of a turn's response, which decides how it is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Text,
    Image,
    Error,
}

/// A response payload. The variant carries the kind, so payload and tag
/// cannot disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Text(String),
    Images(Vec<ImageRef>),
    /// A collaborator failed while answering; shown to the user in place of an answer.
    Error(String),
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Text(_) => ResponseKind::Text,
            Response::Images(_) => ResponseKind::Image,
            Response::Error(_) => ResponseKind::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub query: String,
    pub route: PromptKind,
    pub response: Response,
}

impl ConversationTurn {
    pub fn kind(&self) -> ResponseKind {
        self.response.kind()
    }
}

#[derive(Clone, Debug)]
pub enum IndexState {
    Ready(DocumentIndex),
    Failed(String),
}

/// One upload batch and the conversation held about it.
#[derive(Debug)]
pub struct Session {
    files: Vec<UploadedFile>,
    index: IndexState,
    turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new(files: Vec<UploadedFile>, index: IndexState) -> Self {
        Self {
            files,
            index,
            turns: Vec::new(),
        }
    }

    pub fn greeting(&self) -> &'static str {
        GREETING
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn index(&self) -> &IndexState {
        &self.index
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Appends a turn; the log is never edited otherwise.
    pub fn push_turn(&mut self, turn: ConversationTurn) -> &ConversationTurn {
        self.turns.push(turn);
        let last = self.turns.len() - 1;
        &self.turns[last]
    }
}

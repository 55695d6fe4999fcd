use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A retrieved chunk with the report it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub source: String,
    pub chunk: String,
    pub score: f32,
}

pub fn build_prompt_with_context(system_prompt: &str, question: &str, hits: &[Hit]) -> Vec<Message> {
    let context = format_context_from_hits(hits);
    let user_content = format!(
        "Use the report excerpts below to answer the question.\n\nContext:\n{}\n\nQuestion: {}",
        context, question
    );
    vec![Message::system(system_prompt), Message::user(user_content)]
}

pub fn format_context_from_hits(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return "(no context found)".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] {}\n{}", i + 1, hit.source, hit.chunk))
        .collect::<Vec<_>>()
        .join("\n\n")
}

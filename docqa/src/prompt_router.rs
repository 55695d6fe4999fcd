use std::fmt;

const TEXT_KEYWORDS: [&str; 6] = ["what", "who", "why", "where", "when", "how"];
const IMAGE_WORDS: [&str; 7] = [
    "image", "picture", "photo", "visual", "report", "images", "reports",
];
const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// How a query should be answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Text,
    Image,
}

impl PromptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Text => "text",
            PromptKind::Image => "image",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword routing. Question words are matched as whole words of the
/// lower-cased query, image words as substrings of it, and image extensions as
/// substrings of the query as typed. Only an image match without any text
/// match routes to image search; ties and misses go to text.
pub fn classify(query: &str) -> PromptKind {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let text_match = words.iter().any(|w| TEXT_KEYWORDS.contains(w));
    let image_match = IMAGE_EXTENSIONS.iter().any(|ext| query.contains(ext))
        || IMAGE_WORDS.iter().any(|w| lower.contains(w));

    if image_match && !text_match {
        PromptKind::Image
    } else {
        PromptKind::Text
    }
}

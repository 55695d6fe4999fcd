/// Splits `text` into trimmed windows of `size` characters, each starting
/// `size - overlap` after the previous one. `size == 0` keeps the text whole.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            vec![]
        } else {
            vec![trimmed.to_string()]
        };
    }
    let overlap = if overlap >= size { size / 4 } else { overlap };

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let chars: Vec<char> = text.chars().collect();
    let len_chars = chars.len();

    while start < len_chars {
        let end = (start + size).min(len_chars);
        let chunk_str: String = chars[start..end].iter().collect();
        let trimmed = chunk_str.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == len_chars {
            break;
        }
        start = end.saturating_sub(overlap);
    }

    chunks
}

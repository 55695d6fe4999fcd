/// Extensions persisted to the working directory and indexed for text answers.
pub const DOCUMENT_FORMATS: &str = "pdf,docx,xlsx,txt";
/// Extensions searched by image similarity.
pub const IMAGE_FORMATS: &str = "jpg,jpeg,png";
/// Extensions the upload surface accepts at all.
pub const UPLOAD_FORMATS: &str = "jpg,jpeg,png,pdf,docx,txt";

/// Lower-cased text after the last `.` of `filename`, if there is one.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether `filename` carries one of the `allowed` extensions (case-insensitive).
pub fn is_allowed_format<S: AsRef<str>>(filename: Option<&str>, allowed: &[S]) -> bool {
    let Some(ext) = filename.and_then(extension) else {
        return false;
    };
    allowed.iter().any(|a| a.as_ref().eq_ignore_ascii_case(&ext))
}

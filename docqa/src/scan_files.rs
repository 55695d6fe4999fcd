use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{open_workbook_from_rs, Reader, Xlsx};
use quick_xml::events::Event;
use zip::ZipArchive;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::file_format::{extension, is_allowed_format};

/// Text content of one persisted report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: String,
    pub text: String,
}

/// Reads every document in `dir` whose text can be extracted. Unsupported or
/// unreadable files are logged and skipped; a missing directory yields nothing.
pub fn scan_files<S: AsRef<str>>(
    dir: &Path,
    document_exts: &[S],
    max_file_bytes: u64,
) -> Vec<SourceDocument> {
    let mut results = Vec::new();
    if !dir.exists() {
        return results;
    }

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if !is_allowed_format(Some(&*name), document_exts) {
            continue;
        }
        if let Ok(meta) = fs::metadata(path) {
            if meta.len() > max_file_bytes {
                warn!(path = %path.display(), bytes = meta.len(), "report too large to index");
                continue;
            }
        }
        match extract_text(path) {
            Ok(Some(text)) if !text.trim().is_empty() => {
                debug!(path = %path.display(), chars = text.len(), "extracted report text");
                results.push(SourceDocument {
                    path: path.to_string_lossy().to_string(),
                    text,
                });
            }
            Ok(Some(_)) => debug!(path = %path.display(), "report has no text"),
            Ok(None) => warn!(path = %path.display(), "no text extractor for this format, skipping"),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable report"),
        }
    }

    results
}

/// `Ok(None)` when the format has no extractor.
pub fn extract_text(path: &Path) -> Result<Option<String>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = extension(&name).unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => {
            let bytes = fs::read(path)?;
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        "pdf" => {
            let bytes = fs::read(path)?;
            let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| Error::Extract {
                path: path.to_string_lossy().to_string(),
                message: e.to_string(),
            })?;
            Ok(Some(text))
        }
        "docx" => {
            let bytes = fs::read(path)?;
            docx_text(&bytes).map(Some).map_err(|message| extract_error(path, message))
        }
        "xlsx" => {
            let bytes = fs::read(path)?;
            xlsx_text(&bytes).map(Some).map_err(|message| extract_error(path, message))
        }
        _ => Ok(None),
    }
}

fn extract_error(path: &Path, message: String) -> Error {
    Error::Extract {
        path: path.to_string_lossy().to_string(),
        message,
    }
}

/// Paragraph text of `word/document.xml`, one paragraph per line.
fn docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&String::from_utf8_lossy(&t)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Every non-empty cell of every sheet, tab-separated per row.
fn xlsx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes.to_vec())).map_err(|e: calamine::XlsxError| e.to_string())?;
    let mut out = String::new();
    for sheet in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet).map_err(|e| e.to_string())?;
        out.push_str(&format!("# {}\n", sheet));
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|c| c.to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !cells.is_empty() {
                out.push_str(&cells.join("\t"));
                out.push('\n');
            }
        }
    }
    Ok(out)
}

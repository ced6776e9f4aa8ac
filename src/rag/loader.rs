//! Multi-format document loading
//!
//! Turns an uploaded file into plain UTF-8 text for the pipeline. Format
//! detection is extension-based with an explicit MIME override for callers
//! that already sniffed a content type. No OCR: image-only PDFs extract to
//! empty or garbage text, which is accepted behavior, not a bug.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::errors::{BotError, Result};

/// Ingestion size ceiling; larger files are rejected before extraction.
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Cap on a single decompressed OOXML entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_TEXT: &str = "text/plain";

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Markdown,
    Text,
}

impl DocumentFormat {
    /// Detect a format from the file extension.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "doc" => Ok(DocumentFormat::Doc),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            "txt" => Ok(DocumentFormat::Text),
            other => Err(BotError::UnsupportedFormat(if other.is_empty() {
                format!("{} (no extension)", path.display())
            } else {
                format!(".{}", other)
            })),
        }
    }

    /// Resolve a declared MIME type.
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime {
            MIME_PDF => Ok(DocumentFormat::Pdf),
            MIME_DOCX => Ok(DocumentFormat::Docx),
            MIME_DOC => Ok(DocumentFormat::Doc),
            MIME_MARKDOWN => Ok(DocumentFormat::Markdown),
            MIME_TEXT => Ok(DocumentFormat::Text),
            other => Err(BotError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => MIME_PDF,
            DocumentFormat::Docx => MIME_DOCX,
            DocumentFormat::Doc => MIME_DOC,
            DocumentFormat::Markdown => MIME_MARKDOWN,
            DocumentFormat::Text => MIME_TEXT,
        }
    }
}

/// A document after extraction, before hashing/chunking
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub text: String,
    pub filename: String,
    pub byte_size: u64,
    pub mime_type: &'static str,
}

/// Load a file and extract its plain text.
///
/// Fails with `UnsupportedFormat` for unknown extensions, `TooLarge` above
/// the 10 MB ceiling, and `Extraction` when the underlying parser cannot
/// read the bytes (corrupt or encrypted input).
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    load_document_with_limit(path, MAX_DOCUMENT_BYTES)
}

pub(crate) fn load_document_with_limit(path: &Path, max_bytes: u64) -> Result<LoadedDocument> {
    let format = DocumentFormat::detect(path)?;

    let byte_size = fs::metadata(path)?.len();
    if byte_size > max_bytes {
        return Err(BotError::TooLarge {
            size: byte_size,
            max: max_bytes,
        });
    }

    let bytes = fs::read(path)?;
    let text = extract_text(&bytes, format)?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(LoadedDocument {
        text,
        filename,
        byte_size,
        mime_type: format.mime_type(),
    })
}

/// Extract plain text from raw bytes of a known format.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        // Legacy .doc carries no cheap structured reader; a lossy text pass
        // mirrors the plain-text fallback the allow-list promises.
        DocumentFormat::Doc => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentFormat::Markdown | DocumentFormat::Text => String::from_utf8(bytes.to_vec())
            .map_err(|e| BotError::Extraction(format!("invalid UTF-8 text: {}", e))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| BotError::Extraction(format!("PDF parse error: {}", e)))
}

/// Pull the concatenated `w:t` runs out of word/document.xml.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| BotError::Extraction(format!("DOCX archive error: {}", e)))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| BotError::Extraction("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| BotError::Extraction(format!("DOCX read error: {}", e)))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(BotError::Extraction(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                } else if e.local_name().as_ref() == b"p" && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_run => {
                out.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(BotError::Extraction(format!("DOCX XML error: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_detect_known_extensions() {
        assert_eq!(
            DocumentFormat::detect(Path::new("a/contract.PDF")).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect(Path::new("notes.md")).unwrap(),
            DocumentFormat::Markdown
        );
        assert_eq!(
            DocumentFormat::detect(Path::new("brief.docx")).unwrap(),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn test_detect_rejects_unknown_extension() {
        let err = DocumentFormat::detect(Path::new("malware.exe")).unwrap_err();
        assert!(matches!(err, BotError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_from_mime_round_trip() {
        for format in [
            DocumentFormat::Pdf,
            DocumentFormat::Docx,
            DocumentFormat::Doc,
            DocumentFormat::Markdown,
            DocumentFormat::Text,
        ] {
            assert_eq!(DocumentFormat::from_mime(format.mime_type()).unwrap(), format);
        }
        assert!(DocumentFormat::from_mime("application/octet-stream").is_err());
    }

    #[test]
    fn test_load_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "terms.txt", b"These are the terms.");
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.text, "These are the terms.");
        assert_eq!(doc.filename, "terms.txt");
        assert_eq!(doc.byte_size, 20);
        assert_eq!(doc.mime_type, MIME_TEXT);
    }

    #[test]
    fn test_load_markdown() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "policy.md", "# Policy\n\nBody text.".as_bytes());
        let doc = load_document(&path).unwrap();
        assert!(doc.text.contains("# Policy"));
        assert_eq!(doc.mime_type, MIME_MARKDOWN);
    }

    #[test]
    fn test_size_ceiling_enforced_before_extraction() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "big.txt", &vec![b'x'; 64]);
        let err = load_document_with_limit(&path, 16).unwrap_err();
        assert!(matches!(err, BotError::TooLarge { size: 64, max: 16 }));
    }

    #[test]
    fn test_invalid_pdf_is_extraction_error() {
        let err = extract_text(b"not a pdf", DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, BotError::Extraction(_)));
    }

    #[test]
    fn test_invalid_docx_is_extraction_error() {
        let err = extract_text(b"not a zip archive", DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, BotError::Extraction(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_document(Path::new("/nonexistent/contract.txt")).unwrap_err();
        assert!(matches!(err, BotError::Io(_)));
    }

    #[test]
    fn test_docx_text_runs_extracted() {
        // Minimal OOXML package: just the document part with two runs.
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();
            writer.start_file("word/document.xml", opts).unwrap();
            writer
                .write_all(
                    br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First clause.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second clause.</w:t></w:r></w:p>
  </w:body>
</w:document>"#,
                )
                .unwrap();
            writer.finish().unwrap();
        }
        let text = extract_text(&buf, DocumentFormat::Docx).unwrap();
        assert!(text.contains("First clause."));
        assert!(text.contains("Second clause."));
    }
}

//! Document processing: turns uploaded file bytes into plain text for
//! inclusion in a model prompt.
//!
//! This is a thin adapter layer over format-specific decoder crates; it
//! adds only type dispatch, a size cap, and output truncation.

mod formats;

use thiserror::Error;

/// Typed extraction failures, surfaced to the user as chat messages
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The declared type and file extension are both unrecognized
    #[error("unsupported file type: {kind}")]
    Unsupported {
        /// Declared MIME type or file extension
        kind: String,
    },
    /// The file is recognized but could not be decoded
    #[error("file could not be parsed: {reason}")]
    Corrupt {
        /// Decoder failure detail
        reason: String,
    },
    /// The file exceeds the configured size cap
    #[error("file is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge {
        /// Actual size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },
}

/// Recognized document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// PDF document
    Pdf,
    /// Word document (OOXML)
    Docx,
    /// Excel workbook (OOXML)
    Xlsx,
    /// Comma-separated values
    Csv,
    /// JSON document
    Json,
    /// Plain text or Markdown
    Text,
}

impl DocumentKind {
    /// Resolve a format from the declared MIME type, falling back to
    /// the file extension.
    #[must_use]
    pub fn detect(file_name: &str, declared_mime: Option<&str>) -> Option<Self> {
        if let Some(mime) = declared_mime {
            let mime = mime.split(';').next().unwrap_or(mime).trim();
            match mime {
                "application/pdf" => return Some(Self::Pdf),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                    return Some(Self::Docx)
                }
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                    return Some(Self::Xlsx)
                }
                "text/csv" | "application/csv" => return Some(Self::Csv),
                "application/json" => return Some(Self::Json),
                "text/plain" | "text/markdown" => return Some(Self::Text),
                _ => {}
            }
        }

        let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Extracted document text
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Plain text, capped at the configured character limit
    pub text: String,
    /// Whether the text was cut at the cap
    pub truncated: bool,
}

/// Marker appended when extracted text is cut at the cap
pub const TRUNCATION_MARKER: &str = "… [content truncated]";

/// Size-capped, type-dispatched text extractor
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    max_bytes: usize,
    max_chars: usize,
}

impl DocumentProcessor {
    /// Create a processor with explicit caps
    #[must_use]
    pub const fn new(max_bytes: usize, max_chars: usize) -> Self {
        Self {
            max_bytes,
            max_chars,
        }
    }

    /// Extract plain text from a file's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::TooLarge`] before any decoding if the
    /// byte size exceeds the cap, [`DocumentError::Unsupported`] when
    /// neither MIME type nor extension is recognized, and
    /// [`DocumentError::Corrupt`] when the decoder rejects the bytes.
    pub fn extract(
        &self,
        file_name: &str,
        declared_mime: Option<&str>,
        bytes: &[u8],
    ) -> Result<Extraction, DocumentError> {
        if bytes.len() > self.max_bytes {
            return Err(DocumentError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let kind = DocumentKind::detect(file_name, declared_mime).ok_or_else(|| {
            DocumentError::Unsupported {
                kind: declared_mime
                    .map(ToString::to_string)
                    .unwrap_or_else(|| extension_of(file_name)),
            }
        })?;

        let text = match kind {
            DocumentKind::Pdf => formats::pdf_text(bytes)?,
            DocumentKind::Docx => formats::docx_text(bytes)?,
            DocumentKind::Xlsx => formats::xlsx_text(bytes)?,
            DocumentKind::Csv => formats::csv_text(bytes)?,
            DocumentKind::Json => formats::json_text(bytes)?,
            DocumentKind::Text => formats::plain_text(bytes),
        };

        Ok(self.cap_output(text))
    }

    /// Truncate extracted text at a char boundary, appending the marker
    fn cap_output(&self, text: String) -> Extraction {
        if text.chars().count() <= self.max_chars {
            return Extraction {
                text,
                truncated: false,
            };
        }

        let cut = text
            .char_indices()
            .nth(self.max_chars)
            .map_or(text.len(), |(pos, _)| pos);
        let mut capped = text[..cut].to_string();
        capped.push('\n');
        capped.push_str(TRUNCATION_MARKER);

        Extraction {
            text: capped,
            truncated: true,
        }
    }
}

fn extension_of(file_name: &str) -> String {
    let ext = file_name.rsplit('.').next().unwrap_or("");
    if ext.is_empty() || ext == file_name {
        "unknown".to_string()
    } else {
        format!(".{}", ext.to_lowercase())
    }
}

//! Upload persistence and document parsing.

use std::path::{Path, PathBuf};
use std::time::Instant;

use vassago_core::{Chunk, Error, Result};

use crate::chunker::Chunker;
use crate::formats::{self, TextUnit};

/// Document formats the processor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Plain UTF-8 text.
    Txt,
    /// Office Open XML word processing document.
    Docx,
}

impl DocumentFormat {
    /// Every supported format.
    pub const ALL: [Self; 3] = [Self::Pdf, Self::Txt, Self::Docx];

    /// Maps a file extension (without the dot, any case) to a format.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Determines the format of `path` from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension).ok_or_else(|| Error::UnsupportedFormat {
            extension: format!(".{}", extension.to_ascii_lowercase()),
        })
    }

    /// Canonical extension for the format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
        }
    }

    /// Runs the format's extractor over raw file bytes.
    fn extract(self, bytes: &[u8], source: &str) -> Result<Vec<TextUnit>> {
        match self {
            Self::Pdf => formats::extract_pdf(bytes, source),
            Self::Txt => Ok(formats::extract_text(bytes)),
            Self::Docx => formats::extract_docx(bytes, source),
        }
    }
}

/// Persists uploads and converts them into chunks.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    upload_dir: PathBuf,
    chunker: Chunker,
}

impl DocumentProcessor {
    /// Creates a processor storing files under `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>, chunker: Chunker) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            chunker,
        }
    }

    /// Writes an uploaded file into the upload directory.
    ///
    /// Only the final component of `filename` is kept, so a client cannot
    /// write outside the directory. An existing file with the same name is
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an empty file name and
    /// [`Error::Io`] when the write fails.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = sanitize_filename(filename)
            .ok_or_else(|| Error::invalid_request(format!("invalid file name: {filename:?}")))?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(name);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "Saved upload");
        Ok(path)
    }

    /// Parses a stored file into chunks tagged with its file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for unknown extensions,
    /// [`Error::Io`] when the file cannot be read, and [`Error::Parse`] for
    /// malformed content.
    pub async fn parse(&self, path: &Path) -> Result<Vec<Chunk>> {
        let start = Instant::now();
        let format = DocumentFormat::from_path(path)?;
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let bytes = tokio::fs::read(path).await?;

        let task_source = source.clone();
        let units = tokio::task::spawn_blocking(move || format.extract(&bytes, &task_source))
            .await
            .map_err(|e| Error::parse(&source, format!("extractor aborted: {e}")))??;

        let chunks = self.chunk_units(&units, &source);

        tracing::info!(
            source = %source,
            format = format.extension(),
            units = units.len(),
            chunks = chunks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Parsed document"
        );

        Ok(chunks)
    }

    fn chunk_units(&self, units: &[TextUnit], source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for unit in units {
            for piece in self.chunker.split(&unit.text) {
                let chunk = Chunk::new(piece, source, chunks.len());
                chunks.push(match unit.page {
                    Some(page) => chunk.with_page(page),
                    None => chunk,
                });
            }
        }
        chunks
    }
}

/// Keeps the last path component of a client-supplied file name.
fn sanitize_filename(filename: &str) -> Option<&str> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

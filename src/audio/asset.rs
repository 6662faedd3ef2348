//! User-supplied audio input.

use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

/// An opaque audio file plus whatever format hint came with it.
///
/// Immutable once created. The bytes are reference-counted so decoders can
/// hand them to a media reader without copying.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    bytes: Arc<[u8]>,
    mime: Option<String>,
    extension: Option<String>,
}

impl AudioAsset {
    /// Create from in-memory bytes and an optional MIME type (e.g. `audio/mpeg`).
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, mime: Option<&str>) -> Self {
        let mime = mime.map(|m| m.trim().to_ascii_lowercase());
        let extension = mime.as_deref().and_then(extension_for_mime).map(str::to_string);
        Self {
            bytes: Arc::from(bytes.into()),
            mime,
            extension,
        }
    }

    /// Read a file from disk, deriving the format hint from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let mime = extension
            .as_deref()
            .and_then(mime_for_extension)
            .map(str::to_string);
        Ok(Self {
            bytes: Arc::from(bytes),
            mime,
            extension,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the raw bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    /// File extension hint without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/mp4" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        "audio/webm" | "audio/x-matroska" => Some("mkv"),
        _ => None,
    }
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "wav" | "wave" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "flac" => Some("audio/flac"),
        "ogg" | "oga" => Some("audio/ogg"),
        "m4a" | "mp4" | "aac" => Some("audio/mp4"),
        "mkv" | "mka" | "webm" => Some("audio/webm"),
        _ => None,
    }
}

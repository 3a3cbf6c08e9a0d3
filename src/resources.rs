use base64::Engine;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Reads a UTF-8 text file from disk.
pub fn load_string(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}

/// Decodes the payload of a `data:` URI.
///
/// Both base64 and plain (percent-free) payloads are accepted.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::NotADataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
    if header.ends_with(";base64") {
        Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Whether `source` looks like a `data:` URI.
pub fn is_data_uri(source: &str) -> bool {
    source.starts_with("data:")
}

/// Removes `.` and resolves `..` components without touching the filesystem.
pub fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The normalized absolute form of `path`, used as the key for anything cached or watched
/// per file.
///
/// Existing files are canonicalized, so every spelling of a file (symlinked directories
/// included) shares one key. Paths that don't exist (yet) are anchored at the current
/// working directory and normalized lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    lexically_normalize(&absolute)
}

/// Joins `relative` onto `base` and normalizes the result.
pub fn resolve_relative(base: &Path, relative: &str) -> PathBuf {
    lexically_normalize(&base.join(relative))
}

#[derive(Debug, Error)]
pub enum DataUriError {
    #[error("source is not a data URI")]
    NotADataUri,
    #[error("data URI has no payload")]
    MissingPayload,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

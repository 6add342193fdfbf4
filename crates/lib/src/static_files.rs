//! Static result server: reads try-on results from the static directory by file name.

use std::path::{Path, PathBuf};

/// Served for every file; results are always written as PNG.
pub const RESULT_MIME: &str = "image/png";

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Only a bare file name is accepted: no separators, no parent references.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Read `dir/filename`.
pub async fn serve(dir: &Path, filename: &str) -> Result<Vec<u8>, ServeError> {
    if !is_plain_file_name(filename) {
        return Err(ServeError::InvalidName(filename.to_string()));
    }
    let path = dir.join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ServeError::NotFound(filename.to_string()))
        }
        Err(e) if path.is_dir() => {
            log::debug!("refusing to serve directory {}: {}", path.display(), e);
            Err(ServeError::NotFound(filename.to_string()))
        }
        Err(source) => Err(ServeError::Io { path, source }),
    }
}

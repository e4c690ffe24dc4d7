//! Input resolution: turn a user-supplied path or URL into a local PDF path.
//!
//! pdfium opens files by path, so URL inputs are downloaded into a `TempDir`
//! that lives as long as the [`ResolvedInput`]. Both kinds are checked for the
//! `%PDF` magic bytes here, so a wrong file is reported as a setup error
//! before any page work starts.

use crate::error::OcrError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A local PDF ready to open.
#[derive(Debug)]
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded copy; removed when this value drops.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Logical document name: the file stem, used when writing output.
    pub fn name(&self) -> String {
        self.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF, downloading it first if it is a URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, OcrError> {
    if input.trim().is_empty() {
        return Err(OcrError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

fn resolve_local(path: &Path) -> Result<ResolvedInput, OcrError> {
    if !path.exists() {
        return Err(OcrError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(OcrError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(OcrError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    file.take(PDF_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| OcrError::Internal(format!("Failed to read '{}': {}", path.display(), e)))?;
    check_magic(path, &head)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path.to_path_buf()))
}

/// `head` is the start of the file; anything shorter than the magic fails.
fn check_magic(path: &Path, head: &[u8]) -> Result<(), OcrError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(magic.len());
    magic[..n].copy_from_slice(&head[..n]);
    Err(OcrError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download(url: &str, timeout_secs: u64) -> Result<ResolvedInput, OcrError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| OcrError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            OcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| OcrError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename_from_url(url));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| OcrError::Internal(format!("Failed to write temp file: {}", e)))?;

    check_magic(&path, &bytes)?;

    info!("Downloaded {} bytes to: {}", bytes.len(), path.display());
    Ok(ResolvedInput::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(filename_from_url("https://x.org/a/scan.pdf"), "scan.pdf");
        assert_eq!(filename_from_url("https://x.org/pdf/1706"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://x.org/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, OcrError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn non_pdf_rejected_by_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"PK\x03\x04 zip, not pdf").unwrap();
        let err = resolve_input(tmp.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OcrError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn pdf_magic_accepted_and_named_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), path.as_path());
        assert_eq!(resolved.name(), "report");
    }

    #[tokio::test]
    async fn files_shorter_than_the_magic_are_not_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in [("stub.pdf", &b"%P"[..]), ("empty.pdf", &b""[..])] {
            let path = dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
            assert!(matches!(err, OcrError::NotAPdf { .. }), "{name}: {err:?}");
        }
    }

    #[test]
    fn short_head_is_zero_padded_in_the_error() {
        let err = check_magic(Path::new("x.pdf"), b"%P").unwrap_err();
        assert!(
            matches!(err, OcrError::NotAPdf { magic, .. } if &magic == b"%P\0\0"),
            "got: {err:?}"
        );
    }
}

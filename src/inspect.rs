//! Document inspection without OCR.

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::output::DocumentInfo;
use crate::pipeline::input;
use crate::pipeline::render::PdfiumRenderer;
use tracing::info;

/// Read page count and metadata of a local PDF or URL.
///
/// Uses the config's password, download timeout and pixel cap. Needs the
/// pdfium library but no recogniser.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &OcrConfig,
) -> Result<DocumentInfo, OcrError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let path = resolved.path().to_path_buf();
    let password = config.password.clone();
    let max_rendered_pixels = config.max_rendered_pixels;

    let info = tokio::task::spawn_blocking(move || {
        let renderer = PdfiumRenderer::new(max_rendered_pixels)?;
        renderer.document_info(&path, password.as_deref())
    })
    .await
    .map_err(|e| OcrError::Internal(format!("inspect task panicked: {e}")))??;

    info!("{}: {} pages", resolved.path().display(), info.page_count);
    Ok(info)
}

//! Classical OCR driver (spec section 4.7 Phase 1 "canary"): shells out to a
//! local Tesseract-compatible binary on a rendered page PNG, the same
//! fallback path the extractor's quality gate would recommend if it were
//! allowed to retry locally instead of paying for vision OCR.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{VerifyError, VerifyResult};

/// Run `binary stdin stdout --dpi <dpi> -l <language>` against a single page
/// image, feeding `png_bytes` on stdin and reading the transcription from
/// stdout, mirroring `run_tesseract_on_page` in the original canary script.
pub async fn run_classical_ocr(binary: &str, language: &str, dpi: u32, png_bytes: &[u8]) -> VerifyResult<String> {
    let mut child = Command::new(binary)
        .arg("stdin")
        .arg("stdout")
        .arg("--dpi")
        .arg(dpi.to_string())
        .arg("-l")
        .arg(language)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| VerifyError::ClassicalOcr(format!("failed to spawn {binary}: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(png_bytes)
            .await
            .map_err(|e| VerifyError::ClassicalOcr(format!("failed to write page image to {binary}: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| VerifyError::ClassicalOcr(format!("{binary} did not complete: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(VerifyError::ClassicalOcr(format!("{binary} exited with {}: {stderr}", output.status)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Multi-page convenience wrapper: renders nothing itself, just concatenates
/// already-OCR'd page texts the way `process_single_doc` concatenates
/// Tesseract output across pages, separated by blank lines.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n\n")
}

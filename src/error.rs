use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that abort a stage. Absent fields and unparseable dates
/// are never errors; they resolve to `None` where they occur.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("{stage}: input not found at {path:?} (run the previous stage first)")]
    MissingInput { stage: &'static str, path: PathBuf },
}

/// Fail with `MissingInput` unless `path` exists.
pub fn require_input(stage: &'static str, path: &std::path::Path) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput {
            stage,
            path: path.to_path_buf(),
        })
    }
}

//! Document upload over plain HTTP.
//!
//! A narrow request/response collaborator: one multipart POST per
//! file, `{"file": "<name>"}` back on success. Uploads never touch the
//! streaming state; their outcomes re-enter the session timeline as
//! commands.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File kinds the assistant can ingest.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "docx", "csv"];

/// Upload failure. Reported to the transcript as an error message;
/// never corrupts protocol state.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file has no name: {0}")]
    Nameless(PathBuf),

    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Shape of the server's success response. The server also sends a
/// `status` field; only the stored file name matters here.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: String,
}

#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: String,
}

impl UploadClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Send one file to the upload endpoint. Returns the name the
    /// server stored it under.
    pub async fn upload(&self, path: &Path) -> Result<String, TransferError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::Nameless(path.to_path_buf()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TransferError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(file = %name, bytes = bytes.len(), "uploading");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response: UploadResponse = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.file)
    }
}

/// Whether the file's extension is one the server accepts. Checked
/// before transmitting anything, mirroring the upload form's
/// client-side filter.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::info;

use crate::api::UploadResponse;
use crate::core::error::UploadError;

/// Sends `path` as the `file` field of a multipart form and returns the URL
/// the server stored it under.
pub async fn upload_file(
    client: &reqwest::Client,
    upload_url: &str,
    path: &Path,
    timeout: Option<Duration>,
) -> Result<String, UploadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let size = bytes.len();

    let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.clone()));
    let mut request = client.post(upload_url).multipart(form);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await?;
    let ok = response.status().is_success();
    let body: Option<UploadResponse> = response.json().await.ok();

    match (ok, body) {
        (true, Some(UploadResponse { url: Some(url), .. })) => {
            info!(file = %file_name, size, %url, "Uploaded file");
            Ok(url)
        }
        (_, Some(UploadResponse {
            message: Some(message),
            ..
        })) => Err(UploadError::Rejected(message)),
        _ => Err(UploadError::Rejected(
            "server returned no file URL".to_string(),
        )),
    }
}

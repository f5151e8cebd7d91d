use crate::{EditorConfig, MediaError, UploadError};
use serde::Deserialize;
use tracing::{debug, warn};

/// A chosen file held only for the duration of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PendingUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), content_type: None, bytes }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn validate(&self, config: &EditorConfig) -> Result<(), MediaError> {
        if self.size() > config.max_image_size {
            return Err(MediaError::FileTooLarge { size: self.size(), limit: config.max_image_size });
        }
        match self.extension() {
            Some(ext) if config.allows_extension(&ext) => Ok(()),
            Some(ext) => Err(MediaError::UnsupportedFileType(ext)),
            None => Err(MediaError::UnsupportedFileType(self.file_name.clone())),
        }
    }
}

/// Sends a file to the image endpoint and yields the public URL.
#[allow(async_fn_in_trait)]
pub trait Uploader {
    async fn upload(&self, file: PendingUpload) -> Result<String, UploadError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Maps a raw endpoint reply onto the upload outcome.
pub fn interpret_upload_response(status: u16, body: &str) -> Result<String, UploadError> {
    let parsed = serde_json::from_str::<UploadResponse>(body);
    if !(200..300).contains(&status) {
        let message = match parsed {
            Ok(UploadResponse { error: Some(e), .. }) if !e.is_empty() => e,
            _ => format!("HTTP {status}"),
        };
        return Err(UploadError::Http { status: Some(status), message });
    }
    let response = parsed.map_err(|e| UploadError::Server(format!("malformed response: {e}")))?;
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(UploadError::Server(error));
    }
    response.link.filter(|l| !l.trim().is_empty()).ok_or(UploadError::MissingLink)
}

/// Absolute endpoint for a possibly relative upload URL.
pub fn resolve_endpoint(origin: Option<&str>, upload_url: &str) -> String {
    let url = upload_url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match origin {
        Some(origin) => {
            let origin = origin.trim_end_matches('/');
            if url.starts_with('/') {
                format!("{origin}{url}")
            } else {
                format!("{origin}/{url}")
            }
        }
        None => url.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }

    pub fn from_config(config: &EditorConfig, origin: Option<&str>) -> Self {
        Self::new(resolve_endpoint(origin, &config.upload_url))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn transport(e: reqwest::Error) -> UploadError {
    UploadError::Http { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
}

impl Uploader for HttpUploader {
    async fn upload(&self, file: PendingUpload) -> Result<String, UploadError> {
        debug!(endpoint = %self.endpoint, file = %file.file_name, bytes = file.size(), "uploading image");
        let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
        let part = match file.content_type {
            Some(ct) => part.mime_str(&ct).map_err(transport)?,
            None => part,
        };
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self.client.post(&self.endpoint).multipart(form).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        let result = interpret_upload_response(status, &body);
        if let Err(e) = &result {
            warn!(status, error = %e, "image upload failed");
        }
        result
    }
}

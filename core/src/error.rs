use crate::MediaKind;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("upload request failed: {message}")]
    Http { status: Option<u16>, message: String },
    #[error("upload rejected: {0}")]
    Server(String),
    #[error("upload response did not contain an image link")]
    MissingLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("choose a file to upload or enter an image URL")]
    MissingSource,
    #[error("not a recognizable YouTube URL or video id: {0}")]
    InvalidVideoUrl(String),
    #[error("link text and URL are both required")]
    InvalidLinkFields,
    #[error("file is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },
    #[error("file type not allowed: {0}")]
    UnsupportedFileType(String),
    #[error("a {0} insertion is already in progress")]
    AlreadyProcessing(MediaKind),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRegion {
    Toolbar,
    Surface,
}

impl fmt::Display for HostRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostRegion::Toolbar => f.write_str("toolbar"),
            HostRegion::Surface => f.write_str("editing surface"),
        }
    }
}

fn join_regions(regions: &[HostRegion]) -> String {
    regions.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("editor cannot start, missing: {}", join_regions(.missing))]
pub struct InitializationError {
    pub missing: Vec<HostRegion>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid editor configuration: {0}")]
    Json(#[from] serde_json::Error),
}

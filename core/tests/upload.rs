use rte_core::{
    interpret_upload_response, resolve_endpoint, EditorConfig, HttpUploader, MediaError, PendingUpload, UploadError,
};

#[test]
fn successful_response_yields_the_link() {
    assert_eq!(
        interpret_upload_response(200, r#"{"link":"https://cdn.test/a.png"}"#),
        Ok("https://cdn.test/a.png".to_string())
    );
}

#[test]
fn error_field_wins_even_with_ok_status() {
    assert_eq!(
        interpret_upload_response(200, r#"{"error":"quota exceeded"}"#),
        Err(UploadError::Server("quota exceeded".into()))
    );
    assert_eq!(
        interpret_upload_response(200, r#"{"link":"https://cdn.test/a.png","error":"nope"}"#),
        Err(UploadError::Server("nope".into()))
    );
}

#[test]
fn missing_or_blank_link_is_an_error() {
    assert_eq!(interpret_upload_response(200, "{}"), Err(UploadError::MissingLink));
    assert_eq!(interpret_upload_response(201, r#"{"link":"  "}"#), Err(UploadError::MissingLink));
    assert!(matches!(interpret_upload_response(200, "<html>"), Err(UploadError::Server(_))));
}

#[test]
fn http_failures_keep_the_status() {
    assert_eq!(
        interpret_upload_response(413, r#"{"error":"too big"}"#),
        Err(UploadError::Http { status: Some(413), message: "too big".into() })
    );
    assert_eq!(
        interpret_upload_response(500, "Internal Server Error"),
        Err(UploadError::Http { status: Some(500), message: "HTTP 500".into() })
    );
}

#[test]
fn endpoint_resolution() {
    assert_eq!(resolve_endpoint(Some("https://site.test/"), "/upload_image"), "https://site.test/upload_image");
    assert_eq!(resolve_endpoint(Some("https://site.test"), "upload"), "https://site.test/upload");
    assert_eq!(resolve_endpoint(Some("https://site.test"), "https://cdn.test/up"), "https://cdn.test/up");
    assert_eq!(resolve_endpoint(None, "/upload_image"), "/upload_image");
    let uploader = HttpUploader::from_config(&EditorConfig::default(), Some("http://localhost:5000"));
    assert_eq!(uploader.endpoint(), "http://localhost:5000/upload_image");
}

#[test]
fn files_are_checked_against_the_config() {
    let config = EditorConfig::default();
    assert_eq!(PendingUpload::new("Photo.JPG", vec![0; 10]).validate(&config), Ok(()));
    assert_eq!(
        PendingUpload::new("notes.pdf", vec![0; 10]).validate(&config),
        Err(MediaError::UnsupportedFileType("pdf".into()))
    );
    assert_eq!(
        PendingUpload::new("README", vec![0; 10]).validate(&config),
        Err(MediaError::UnsupportedFileType("README".into()))
    );
    let small = EditorConfig { max_image_size: 5, ..EditorConfig::default() };
    assert_eq!(
        PendingUpload::new("a.png", vec![0; 6]).validate(&small),
        Err(MediaError::FileTooLarge { size: 6, limit: 5 })
    );
}

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::capture::CapturedImage;
use crate::config::ClassifierConfig;

pub const IMAGE_FIELD: &str = "image";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub class: String,
    pub biodegradable: bool,
    /// Absent when the service does not report nutrients
    #[serde(default)]
    pub nutrient_levels: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Could not reach classification service: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Classification service returned {status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("Unexpected response from classification service: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("Could not build image upload: {0}")]
    InvalidPayload(#[source] reqwest::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Image bytes to submit, either from the camera or an uploaded file.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    Captured(CapturedImage),
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime: &'static str,
    },
}

impl ImagePayload {
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(ImagePayload::File {
            bytes,
            mime: mime_for_path(path),
            file_name,
        })
    }

    pub fn byte_len(&self) -> usize {
        match self {
            ImagePayload::Captured(image) => image.jpeg.len(),
            ImagePayload::File { bytes, .. } => bytes.len(),
        }
    }

    fn into_part(self) -> Result<Part, reqwest::Error> {
        match self {
            ImagePayload::Captured(image) => Part::bytes(image.jpeg)
                .file_name("capture.jpg")
                .mime_str("image/jpeg"),
            ImagePayload::File {
                bytes,
                file_name,
                mime,
            } => Part::bytes(bytes).file_name(file_name).mime_str(mime),
        }
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// One multipart POST per call, image under the `image` field. Never retried.
#[derive(Clone)]
pub struct ClassificationClient {
    client: Client,
    endpoint: Url,
}

impl ClassificationClient {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        Self::with_endpoint(&config.endpoint_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid classification endpoint: {}", endpoint))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn classify(&self, payload: ImagePayload) -> Result<ClassificationResult, ClassifyError> {
        log::info!("Submitting {} byte image to {}", payload.byte_len(), self.endpoint);

        let part = payload.into_part().map_err(ClassifyError::InvalidPayload)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(ClassifyError::Network)?;

        let status = response.status();
        let body = response.bytes().await.map_err(ClassifyError::Network)?;
        log::debug!("Classification response {} ({} bytes)", status, body.len());

        parse_response(status, &body)
    }
}

pub fn parse_response(status: StatusCode, body: &[u8]) -> Result<ClassificationResult, ClassifyError> {
    if !status.is_success() {
        return Err(ClassifyError::Server {
            status,
            message: server_message(status, body),
        });
    }

    Ok(serde_json::from_slice(body)?)
}

fn server_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(ErrorBody { error }) = serde_json::from_slice(body) {
        if !error.trim().is_empty() {
            return error;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    }

    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const PLASTIC: &str =
        r#"{"class":"plastic","biodegradable":false,"nutrient_levels":{"N":0.5,"P":0.2}}"#;

    fn jpeg_payload() -> ImagePayload {
        ImagePayload::Captured(CapturedImage {
            jpeg: vec![0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9],
            width: 1,
            height: 1,
        })
    }

    async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let Some(header_end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok());

            let complete = match content_length {
                Some(len) => data.len() >= header_end + 4 + len,
                None => data.ends_with(b"0\r\n\r\n") || data.ends_with(b"--\r\n"),
            };
            if complete {
                break;
            }
        }
        data
    }

    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}/classify_waste", addr), handle)
    }

    #[test]
    fn test_parse_full_result() {
        let result = parse_response(StatusCode::OK, PLASTIC.as_bytes()).unwrap();

        assert_eq!(result.class, "plastic");
        assert!(!result.biodegradable);
        let nutrients = result.nutrient_levels.unwrap();
        assert_eq!(nutrients.len(), 2);
        assert_eq!(nutrients["N"], 0.5);
        assert_eq!(nutrients["P"], 0.2);
    }

    #[test]
    fn test_parse_without_nutrients() {
        let result =
            parse_response(StatusCode::OK, br#"{"class":"glass","biodegradable":false}"#).unwrap();

        assert_eq!(result.class, "glass");
        assert!(result.nutrient_levels.is_none());
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let cases: [&[u8]; 4] = [
            br#"{"biodegradable":true}"#,
            br#"{"class":"paper","biodegradable":"yes"}"#,
            br#"{"class":"paper","biodegradable":true,"nutrient_levels":{"N":"high"}}"#,
            b"<html>gateway</html>",
        ];

        for body in cases {
            assert!(matches!(
                parse_response(StatusCode::OK, body),
                Err(ClassifyError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_server_error_uses_error_field() {
        let err = parse_response(
            StatusCode::BAD_REQUEST,
            br#"{"error": "No image file provided"}"#,
        )
        .unwrap_err();

        match err {
            ClassifyError::Server { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "No image file provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_server_error_without_body_uses_reason() {
        let err = parse_response(StatusCode::SERVICE_UNAVAILABLE, b"").unwrap_err();
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("bottle.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("can.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("scan.tiff")), "image/tiff");
        assert_eq!(mime_for_path(Path::new("notes")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_classify_posts_image_field() {
        let (url, server) = serve_once("200 OK", PLASTIC).await;
        let client = ClassificationClient::with_endpoint(&url, Duration::from_secs(5)).unwrap();

        let result = client.classify(jpeg_payload()).await.unwrap();
        assert_eq!(result.class, "plastic");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /classify_waste"));
        assert!(request.to_lowercase().contains("content-type: multipart/form-data"));
        assert!(request.contains("name=\"image\""));
        assert!(request.contains("filename=\"capture.jpg\""));
        assert!(request.contains("image/jpeg"));
    }

    #[tokio::test]
    async fn test_classify_uploaded_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("banana_peel.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        let payload = ImagePayload::from_path(&path).await.unwrap();
        let (url, server) =
            serve_once("200 OK", r#"{"class":"trash","biodegradable":true}"#).await;
        let client = ClassificationClient::with_endpoint(&url, Duration::from_secs(5)).unwrap();

        let result = client.classify(payload).await.unwrap();
        assert!(result.biodegradable);
        assert!(result.nutrient_levels.is_none());

        let request = server.await.unwrap();
        assert!(request.contains("filename=\"banana_peel.png\""));
        assert!(request.contains("image/png"));
    }

    #[tokio::test]
    async fn test_classify_surfaces_server_error() {
        let (url, server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":"model not loaded"}"#,
        )
        .await;
        let client = ClassificationClient::with_endpoint(&url, Duration::from_secs(5)).unwrap();

        let err = client.classify(jpeg_payload()).await.unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Server { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(err.to_string().contains("model not loaded"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_classify_surfaces_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/classify_waste", addr);
        let client = ClassificationClient::with_endpoint(&url, Duration::from_secs(5)).unwrap();

        let err = client.classify(jpeg_payload()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Network(_)));
        assert!(!err.to_string().is_empty());
    }
}

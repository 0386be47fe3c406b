use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{mime_for, ExternalError};
use crate::settings::settings;

/// Unsigned upload to the image host; returns a durable URL the rest of
/// the system stores as plain text.
#[derive(Clone, Default)]
pub struct ImageHostClient {
    http: Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    #[serde(default)]
    public_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedImage {
    pub url: String,
    pub public_id: Option<String>,
}

impl ImageHostClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<HostedImage, ExternalError> {
        let s = &settings().image_host;
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))
            .map_err(|e| ExternalError::Malformed(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", s.upload_preset.clone())
            .text("folder", s.folder.clone());

        let response = self
            .http
            .post(format!("{}/image/upload", s.base_url))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status()));
        }
        let payload: UploadResponse = response.json().await?;
        Ok(HostedImage {
            url: payload.secure_url,
            public_id: payload.public_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_response() {
        let raw = r#"{
            "secure_url": "https://images.example.com/cropwise/community/leaf.jpg",
            "public_id": "cropwise/community/leaf"
        }"#;
        let payload: UploadResponse = serde_json::from_str(raw).unwrap();
        assert!(payload.secure_url.starts_with("https://"));
        assert_eq!(payload.public_id.as_deref(), Some("cropwise/community/leaf"));
    }
}

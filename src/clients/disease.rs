use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{mime_for, ExternalError};
use crate::settings::settings;

/// Client for the remote leaf-classification model. The model itself is
/// an opaque oracle; only the request/response contract lives here.
#[derive(Clone, Default)]
pub struct DiseaseClient {
    http: Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionDetail {
    pub probability: f64,
    pub label_en: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseSummary {
    pub name: String,
    pub description: String,
    pub treatment: String,
}

/// The oracle reports errors in-band with `success: false` (for example
/// when no leaf is detected), so most fields are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub success: bool,
    #[serde(default)]
    pub predicted_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub disease_info: Option<DiseaseSummary>,
    #[serde(default)]
    pub all_predictions: Option<HashMap<String, PredictionDetail>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub predicted_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
    #[serde(default)]
    pub error: Option<String>,
}

fn image_part(bytes: Vec<u8>, filename: &str) -> Result<Part, ExternalError> {
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime_for(filename))
        .map_err(|e| ExternalError::Malformed(e.to_string()))
}

impl DiseaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn predict(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<PredictionResult, ExternalError> {
        let form = Form::new().part("file", image_part(bytes, filename)?);
        let response = self
            .http
            .post(format!("{}/predict", settings().disease_api.base_url))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn predict_batch(
        &self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<BatchResponse, ExternalError> {
        let mut form = Form::new();
        for (filename, bytes) in files {
            form = form.part("files", image_part(bytes, &filename)?);
        }
        let response = self
            .http
            .post(format!("{}/predict-batch", settings().disease_api.base_url))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn status(&self) -> Result<bool, ExternalError> {
        let response = self
            .http
            .get(format!("{}/", settings().disease_api.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_successful_prediction() {
        let raw = r#"{
            "success": true,
            "predicted_class": "Common_Rust",
            "confidence": 97.3,
            "disease_info": {
                "name": "Common Rust",
                "description": "Fungal disease with orange pustules.",
                "treatment": "Spray mancozeb."
            },
            "all_predictions": {
                "Common_Rust": {"probability": 97.3, "label_en": "Common_Rust"},
                "Healthy": {"probability": 1.1, "label_en": "Healthy"}
            }
        }"#;
        let result: PredictionResult = serde_json::from_str(raw).unwrap();
        assert!(result.success);
        assert_eq!(result.predicted_class.as_deref(), Some("Common_Rust"));
        assert_eq!(result.all_predictions.unwrap().len(), 2);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_parse_in_band_error() {
        let raw = r#"{"success": false, "error": "no leaf detected"}"#;
        let result: PredictionResult = serde_json::from_str(raw).unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no leaf detected"));
        assert!(result.predicted_class.is_none());
    }

    #[test]
    fn test_parse_batch_response() {
        let raw = r#"{
            "success": true,
            "processed": 1,
            "failed": 1,
            "results": [
                {"filename": "a.jpg", "success": true, "predicted_class": "Healthy", "confidence": 99.0},
                {"filename": "b.jpg", "success": false, "error": "no leaf detected"}
            ]
        }"#;
        let batch: BatchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.processed, 1);
        assert_eq!(batch.results.len(), 2);
        assert!(!batch.results[1].success);
    }
}

pub mod disease;
pub mod imagehost;
pub mod weather;

pub use disease::DiseaseClient;
pub use imagehost::ImageHostClient;
pub use weather::WeatherClient;

use thiserror::Error;

/// Failures talking to the opaque oracles. The core logic never retries
/// these; they surface to the client as a generic upstream failure.
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub(crate) fn mime_for(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for("leaf.PNG"), "image/png");
        assert_eq!(mime_for("leaf.jpg"), "image/jpeg");
        assert_eq!(mime_for("no-extension"), "image/jpeg");
    }
}

//! Trim request/response models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /api/trim-video`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRequest {
    /// Server-side path returned by the upload endpoint
    #[serde(default, alias = "filePath")]
    pub path: Option<String>,
    /// Start of the kept range in seconds
    #[serde(default)]
    pub start: Option<f64>,
    /// End of the kept range in seconds
    #[serde(default)]
    pub end: Option<f64>,
    /// Quality (0-51, lower is better); kept raw so bad values fall back to the default
    #[serde(default)]
    pub crf: Option<Value>,
}

/// Response body for `POST /api/trim-video`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimResponse {
    pub success: bool,
    pub url: String,
}

impl TrimResponse {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            success: true,
            url: url.into(),
        }
    }
}

/// Response body for `POST /api/upload-video`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Absolute server path to pass back to the processing endpoints
    pub path: String,
}

impl UploadResponse {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            success: true,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_request_keeps_raw_crf() {
        let req: TrimRequest =
            serde_json::from_str(r#"{"filePath":"/x.mp4","start":0,"end":10,"crf":"high"}"#).unwrap();
        assert_eq!(req.start, Some(0.0));
        assert_eq!(req.end, Some(10.0));
        assert_eq!(req.crf, Some(Value::String("high".to_string())));
    }

    #[test]
    fn test_trim_request_missing_fields() {
        let req: TrimRequest = serde_json::from_str(r#"{"path":"/x.mp4"}"#).unwrap();
        assert!(req.start.is_none());
        assert!(req.end.is_none());
        assert!(req.crf.is_none());
    }
}

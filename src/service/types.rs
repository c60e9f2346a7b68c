//! Wire types for the job pipeline

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::StagingError;

/// Inbound job message: `{"fileName": "...", "imageData": "<base64>"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub file_name: String,
    pub image_data: String,
}

impl Job {
    pub fn parse(body: &str) -> Result<Self, StagingError> {
        serde_json::from_str(body).map_err(StagingError::MalformedJob)
    }

    /// Object key for the result: the file name without its extension
    pub fn result_key(&self) -> Result<&str, StagingError> {
        result_key(&self.file_name)
    }

    pub fn decode_image(&self) -> Result<Vec<u8>, StagingError> {
        Ok(STANDARD.decode(self.image_data.trim())?)
    }
}

/// Validate a bare file name with an extension and return its stem
///
/// The stem is everything before the last `.`, so `a.b.jpg` maps to `a.b`.
pub fn result_key(file_name: &str) -> Result<&str, StagingError> {
    let invalid = || StagingError::InvalidFileName(file_name.to_string());

    if file_name.is_empty()
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0'])
    {
        return Err(invalid());
    }

    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Ok(stem),
        _ => Err(invalid()),
    }
}

/// Recognition result for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub result_key: String,
    pub label: String,
}

impl ResultPayload {
    pub fn response_message(&self) -> ResponseMessage {
        ResponseMessage {
            file_name: format!("{}.jpg", self.result_key),
            result: self.label.clone(),
        }
    }
}

/// Outbound response message: `{"fileName": "<key>.jpg", "result": "<label>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub file_name: String,
    pub result: String,
}

/// Envelope for messages routed to the dead-letter queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub message_id: String,
    pub body: String,
    pub error: String,
    pub receive_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job() {
        let job = Job::parse(r#"{"fileName":"alice.jpg","imageData":"aGVsbG8="}"#).unwrap();
        assert_eq!(job.file_name, "alice.jpg");
        assert_eq!(job.result_key().unwrap(), "alice");
        assert_eq!(job.decode_image().unwrap(), b"hello");
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(matches!(
            Job::parse(r#"{"fileName":"alice.jpg"}"#),
            Err(StagingError::MalformedJob(_))
        ));
    }

    #[test]
    fn test_bad_base64() {
        let job = Job {
            file_name: "a.jpg".into(),
            image_data: "***".into(),
        };
        assert!(matches!(job.decode_image(), Err(StagingError::Decode(_))));
    }

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("test_00.jpg").unwrap(), "test_00");
        assert_eq!(result_key("a.b.png").unwrap(), "a.b");
        for bad in ["", "noext", ".jpg", "a.", "..", "../x.jpg", "dir/x.jpg", "c:\\x.jpg"] {
            assert!(result_key(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_response_message_json() {
        let payload = ResultPayload {
            result_key: "alice".into(),
            label: "alice".into(),
        };
        let json = serde_json::to_string(&payload.response_message()).unwrap();
        assert_eq!(json, r#"{"fileName":"alice.jpg","result":"alice"}"#);
    }
}

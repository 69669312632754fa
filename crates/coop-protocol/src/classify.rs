//! Semantic classification of decoded payloads
//!
//! Classification only answers "what kind of message is this and what is
//! its body". Enrichment with sender identity and receive time is the
//! dispatcher's job, since it needs the transport and a clock.

use serde_json::Value;
use thiserror::Error;

use crate::message::{JsonMap, MsgType, DATA_KEY, MSG_TYPE_KEY};

/// Errors produced by classification
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassifyError {
    /// Payload carries no integer `msg_type` field
    #[error("payload has no integer msg_type field")]
    MissingType,

    /// `msg_type` code is not a known variant; dropped for forward compatibility
    #[error("unknown msg_type code {0}")]
    UnknownType(i64),

    /// Known type but the `data` sub-object is missing or not an object
    #[error("msg_type {0} payload has no data object")]
    MissingBody(i64),
}

/// A payload with its type determined and body extracted
#[derive(Debug, Clone)]
pub struct Classified {
    /// The recognized message type
    pub msg_type: MsgType,
    /// The `data` sub-object of the payload
    pub body: JsonMap,
}

/// Classify a decoded payload
///
/// Unknown types come back as [`ClassifyError::UnknownType`]; the caller is
/// expected to log and drop, never to propagate them as failures.
pub fn classify(payload: &JsonMap) -> Result<Classified, ClassifyError> {
    let code = payload
        .get(MSG_TYPE_KEY)
        .and_then(Value::as_i64)
        .ok_or(ClassifyError::MissingType)?;

    let msg_type = MsgType::from_code(code).ok_or(ClassifyError::UnknownType(code))?;

    let body = payload
        .get(DATA_KEY)
        .and_then(Value::as_object)
        .cloned()
        .ok_or(ClassifyError::MissingBody(code))?;

    Ok(Classified { msg_type, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn measurements_payload() -> JsonMap {
        let mut payload = JsonMap::new();
        payload.insert("msg_type".into(), json!(0));
        payload.insert("data".into(), json!({"temperature": 21.0}));
        payload
    }

    #[test]
    fn test_classify_measurements() {
        let classified = classify(&measurements_payload()).unwrap();
        assert_eq!(classified.msg_type, MsgType::Measurements);
        assert_eq!(classified.body["temperature"], 21.0);
    }

    #[test]
    fn test_unknown_type() {
        let mut payload = measurements_payload();
        payload.insert("msg_type".into(), json!(999));
        assert_eq!(classify(&payload).unwrap_err(), ClassifyError::UnknownType(999));
    }

    #[test]
    fn test_missing_type() {
        let mut payload = measurements_payload();
        payload.remove("msg_type");
        assert_eq!(classify(&payload).unwrap_err(), ClassifyError::MissingType);

        // Non-integer discriminants are just as missing
        payload.insert("msg_type".into(), json!("measurements"));
        assert_eq!(classify(&payload).unwrap_err(), ClassifyError::MissingType);
    }

    #[test]
    fn test_missing_body() {
        let mut payload = measurements_payload();
        payload.remove("data");
        assert_eq!(classify(&payload).unwrap_err(), ClassifyError::MissingBody(0));

        payload.insert("data".into(), json!([1, 2]));
        assert_eq!(classify(&payload).unwrap_err(), ClassifyError::MissingBody(0));
    }
}

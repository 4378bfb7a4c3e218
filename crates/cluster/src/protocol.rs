//! Peer-to-peer wire protocol.
//!
//! One endpoint: `POST /fetch` with a JSON body. A success response is the
//! user fetch function's value serialised as-is; a failure is a 4xx/5xx
//! with a structured `{"error", "detail"}` body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known path peers POST to.
pub const FETCH_PATH: &str = "/fetch";

/// Request body for `POST /fetch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub key: String,
    pub params: Value,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let body = r#"{"key":"k","params":{"val":1}}"#;
        let request: FetchRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.key, "k");
        assert_eq!(request.params, json!({"val": 1}));
    }

    #[test]
    fn test_request_rejects_missing_key() {
        assert!(serde_json::from_str::<FetchRequest>(r#"{"params":{}}"#).is_err());
    }
}

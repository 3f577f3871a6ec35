//! Wire protocol for the operator control socket (§4.12/§4.14).
//!
//! A JSON-RPC-like protocol, one request or response per newline-terminated
//! line, restricted to the three methods this surface actually exposes:
//! `health`, `status`, and `shutdown`. This is deliberately not the HTTP
//! admin API excluded in §1 — it has no session/repository/auth surface,
//! only the operational start/stop/status triangle the CLI front-end needs.

use serde::{Deserialize, Serialize};

/// Control-socket method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Health,
    Status,
    Shutdown,
}

/// Control-socket request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Control-socket response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: i32,
    pub message: String,
}

impl Response {
    pub fn success(id: &str, result: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: &str, code: i32, message: &str) -> Self {
        Self {
            id: id.to_string(),
            result: None,
            error: Some(ErrorInfo {
                code,
                message: message.to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let request = Request::new(Method::Health);
        let json = request.to_json().unwrap();
        let parsed = Request::from_json(&json).unwrap();
        assert_eq!(parsed.method, Method::Health);
        assert_eq!(parsed.id, request.id);
    }

    #[test]
    fn response_success_has_no_error() {
        let response = Response::success("1", serde_json::json!({"ok": true}));
        assert!(response.is_success());
    }

    #[test]
    fn response_error_has_no_result() {
        let response = Response::error("1", error_codes::METHOD_NOT_FOUND, "nope");
        assert!(!response.is_success());
        assert!(response.result.is_none());
    }
}

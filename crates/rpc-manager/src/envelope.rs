//! Bus envelope shapes for cross-instance RPC (§4.4 steps 3-4, §9: tagged
//! variants with explicit fields, validated before dispatch — no dynamically
//! typed envelopes).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Published on `rpc/<router-id>` when the caller's instance does not own
/// the router's connection. Carries the originating instance's response
/// channel so the owning instance knows where to publish the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcBusRequest {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub path: String,
    pub method: String,
    pub args: Value,
    #[serde(rename = "_response-channel")]
    pub response_channel: String,
}

impl RpcBusRequest {
    pub fn new(id: String, path: String, method: String, args: Value, response_channel: String) -> Self {
        Self {
            frame_type: "rpc".to_string(),
            id,
            path,
            method,
            args,
            response_channel,
        }
    }
}

/// Published on `rpc/response/<instance-id>` by the owning instance once
/// the router has answered a bus-originated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcBusResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_request_carries_response_channel_field() {
        let req = RpcBusRequest::new(
            "inst-a-1-0".to_string(),
            "system".to_string(),
            "info".to_string(),
            serde_json::json!({}),
            "router:rpc:response:inst-a".to_string(),
        );
        let encoded = serde_json::to_string(&req).unwrap();
        assert!(encoded.contains("\"_response-channel\""));
    }
}

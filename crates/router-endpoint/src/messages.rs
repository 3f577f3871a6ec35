//! Router wire protocol (§6): every frame carries a `type` tag. Frames are
//! discrete, JSON-encoded unless explicitly binary (tunnel payloads are
//! base64 inside JSON, not raw binary frames, matching §4.1/§4.5).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames the core accepts from a connected router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FromRouterFrame {
    #[serde(rename = "metrics")]
    Metrics,
    #[serde(rename = "rpc-result")]
    RpcResult {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    #[serde(rename = "tunnel-data")]
    TunnelData {
        #[serde(rename = "sessionId")]
        session_id: String,
        data: String,
    },
    #[serde(rename = "tunnel-started")]
    TunnelStarted {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    #[serde(rename = "tunnel-error")]
    TunnelError {
        #[serde(rename = "sessionId")]
        session_id: String,
        error: String,
    },
    #[serde(rename = "name-update")]
    NameUpdate { name: String },
}

/// Frames the core sends to a connected router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToRouterFrame {
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "routerId")]
        router_id: String,
        timestamp: i64,
    },
    #[serde(rename = "rpc")]
    Rpc {
        id: String,
        path: String,
        method: String,
        args: Value,
    },
    #[serde(rename = "tunnel-start")]
    TunnelStart {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    #[serde(rename = "tunnel-data")]
    TunnelData {
        #[serde(rename = "sessionId")]
        session_id: String,
        data: String,
    },
    #[serde(rename = "tunnel-stop")]
    TunnelStop {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_result_decodes_with_result() {
        let raw = r#"{"type":"rpc-result","id":"x-1","result":{"uptime":42}}"#;
        let frame: FromRouterFrame = serde_json::from_str(raw).unwrap();
        match frame {
            FromRouterFrame::RpcResult { id, result, error } => {
                assert_eq!(id, "x-1");
                assert!(result.is_some());
                assert!(error.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn tunnel_data_round_trips_session_id_casing() {
        let raw = r#"{"type":"tunnel-data","sessionId":"s-1","data":"aGVsbG8="}"#;
        let frame: FromRouterFrame = serde_json::from_str(raw).unwrap();
        match frame {
            FromRouterFrame::TunnelData { session_id, data } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(data, "aGVsbG8=");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn connected_frame_encodes_camelcase_field() {
        let frame = ToRouterFrame::Connected {
            router_id: "r-1".to_string(),
            timestamp: 1000,
        };
        let encoded = serde_json::to_string(&frame).unwrap();
        assert!(encoded.contains("\"routerId\":\"r-1\""));
    }
}

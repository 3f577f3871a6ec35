//! Request shapes the disconnect worker and session reconciler build
//! (§4.8): User-Name is always required; one of NAS-Identifier/NAS-IP
//! must be present; the rest are attached when known.

use std::net::Ipv4Addr;

#[derive(Debug, Clone, Default)]
pub struct NasIdentity {
    pub nas_identifier: Option<String>,
    pub nas_ip_address: Option<Ipv4Addr>,
}

impl NasIdentity {
    pub fn by_identifier(identifier: impl Into<String>) -> Self {
        Self {
            nas_identifier: Some(identifier.into()),
            nas_ip_address: None,
        }
    }

    pub fn by_ip(addr: Ipv4Addr) -> Self {
        Self {
            nas_identifier: None,
            nas_ip_address: Some(addr),
        }
    }

    pub fn is_present(&self) -> bool {
        self.nas_identifier.is_some() || self.nas_ip_address.is_some()
    }
}

/// Parameters for a CoA-Disconnect (code 40) call (§4.7, §4.8).
#[derive(Debug, Clone)]
pub struct DisconnectRequest {
    pub user_name: String,
    pub nas: NasIdentity,
    pub acct_session_id: Option<String>,
    pub calling_station_id: Option<String>,
    pub framed_ip_address: Option<Ipv4Addr>,
    pub called_station_id: Option<String>,
}

/// Parameters for a mid-session CoA-Request (code 43). Only the standard
/// `Session-Timeout` attribute is pushed live; the data-remaining attribute
/// is vendor-specific and is left to the durable reply-attributes table the
/// RADIUS server reads on the user's next auth (`quota-manager`).
#[derive(Debug, Clone)]
pub struct CoaUpdateRequest {
    pub user_name: String,
    pub nas: NasIdentity,
    pub session_timeout_secs: Option<u32>,
}

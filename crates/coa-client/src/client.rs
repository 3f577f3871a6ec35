//! Outbound CoA/DM client (§4.8): UDP/3799, 5s timeout, no retransmission
//! at this layer (retries live in the disconnect worker, §4.7).

use crate::error::{CoaClientError, CoaClientResult};
use crate::request::{CoaUpdateRequest, DisconnectRequest, NasIdentity};
use radius_proto::{
    Attribute, Packet, COA_REQUEST, DISCONNECT_REQUEST, TYPE_ACCT_SESSION_ID,
    TYPE_CALLED_STATION_ID, TYPE_CALLING_STATION_ID, TYPE_FRAMED_IP_ADDRESS, TYPE_NAS_IDENTIFIER,
    TYPE_NAS_IP_ADDRESS, TYPE_SESSION_TIMEOUT, TYPE_USER_NAME,
};
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoaOutcome {
    pub success: bool,
    pub response_code: u8,
}

#[derive(Clone)]
pub struct CoaClient;

impl Default for CoaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoaClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn send_disconnect(
        &self,
        nas_addr: SocketAddr,
        secret: &[u8],
        request: &DisconnectRequest,
    ) -> CoaClientResult<CoaOutcome> {
        let attributes = build_attributes(
            &request.user_name,
            &request.nas,
            request.acct_session_id.as_deref(),
            request.calling_station_id.as_deref(),
            request.framed_ip_address,
            request.called_station_id.as_deref(),
        )?;
        self.send(nas_addr, secret, DISCONNECT_REQUEST, attributes).await
    }

    pub async fn send_coa_update(
        &self,
        nas_addr: SocketAddr,
        secret: &[u8],
        request: &CoaUpdateRequest,
    ) -> CoaClientResult<CoaOutcome> {
        let mut attributes = build_attributes(&request.user_name, &request.nas, None, None, None, None)?;
        if let Some(secs) = request.session_timeout_secs {
            attributes.push(Attribute::new(TYPE_SESSION_TIMEOUT, secs.to_be_bytes().to_vec()));
        }
        self.send(nas_addr, secret, COA_REQUEST, attributes).await
    }

    async fn send(
        &self,
        nas_addr: SocketAddr,
        secret: &[u8],
        code: u8,
        attributes: Vec<Attribute>,
    ) -> CoaClientResult<CoaOutcome> {
        let identifier: u8 = rand::thread_rng().gen();
        let packet = Packet::new(code, identifier, attributes);
        let wire = packet.encode(secret);

        let local_addr: SocketAddr = if nas_addr.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(nas_addr).await?;
        socket.send(&wire).await?;

        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(TIMEOUT, socket.recv(&mut buf))
            .await
            .map_err(|_| CoaClientError::Timeout)??;

        let response = Packet::decode(&buf[..n])?;
        if response.identifier != identifier {
            warn!(
                nas = %nas_addr,
                expected = identifier,
                got = response.identifier,
                "coa response identifier mismatch, treating as no response"
            );
            return Err(CoaClientError::Timeout);
        }
        let success = radius_proto::is_success(response.code);
        debug!(nas = %nas_addr, code = response.code, success, "coa response received");
        Ok(CoaOutcome {
            success,
            response_code: response.code,
        })
    }
}

fn build_attributes(
    user_name: &str,
    nas: &NasIdentity,
    acct_session_id: Option<&str>,
    calling_station_id: Option<&str>,
    framed_ip_address: Option<std::net::Ipv4Addr>,
    called_station_id: Option<&str>,
) -> CoaClientResult<Vec<Attribute>> {
    if !nas.is_present() {
        return Err(CoaClientError::MissingNasIdentity);
    }
    let mut attributes = vec![Attribute::string(TYPE_USER_NAME, user_name)];
    if let Some(identifier) = &nas.nas_identifier {
        attributes.push(Attribute::string(TYPE_NAS_IDENTIFIER, identifier));
    }
    if let Some(ip) = nas.nas_ip_address {
        attributes.push(Attribute::ipv4(TYPE_NAS_IP_ADDRESS, ip));
    }
    if let Some(ip) = framed_ip_address {
        attributes.push(Attribute::ipv4(TYPE_FRAMED_IP_ADDRESS, ip));
    }
    if let Some(called) = called_station_id {
        attributes.push(Attribute::string(TYPE_CALLED_STATION_ID, called));
    }
    if let Some(calling) = calling_station_id {
        attributes.push(Attribute::string(TYPE_CALLING_STATION_ID, calling));
    }
    if let Some(session_id) = acct_session_id {
        attributes.push(Attribute::string(TYPE_ACCT_SESSION_ID, session_id));
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_nas_identity_is_rejected() {
        let err = build_attributes("alice", &NasIdentity::default(), None, None, None, None).unwrap_err();
        assert!(matches!(err, CoaClientError::MissingNasIdentity));
    }

    #[test]
    fn nas_identifier_alone_is_sufficient() {
        let attrs = build_attributes("alice", &NasIdentity::by_identifier("router-1"), None, None, None, None).unwrap();
        assert!(attrs.iter().any(|a| a.type_code == TYPE_NAS_IDENTIFIER));
    }
}

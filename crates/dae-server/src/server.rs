//! UDP accept loop and per-packet dispatch (§4.8).

use crate::config::DaeServerConfig;
use crate::error::DaeServerResult;
use durable_store::{queries, Database, ATTR_DATA_REMAINING, ATTR_SESSION_TIMEOUT};
use radius_proto::{
    Attribute, Packet, COA_ACK, COA_NAK, COA_REQUEST, DISCONNECT_ACK, DISCONNECT_NAK,
    DISCONNECT_REQUEST, TYPE_ACCT_SESSION_ID, TYPE_SESSION_TIMEOUT, TYPE_USER_NAME,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// RFC 2865 §5.26 Vendor-Specific attribute type.
const VENDOR_SPECIFIC: u8 = 26;
/// MikroTik's enterprise number, carrying the `Mikrotik-Total-Limit` VSA the
/// quota manager's reply attribute of the same name mirrors (§3, §4.6).
const MIKROTIK_VENDOR_ID: u32 = 14988;
const MIKROTIK_TOTAL_LIMIT_VENDOR_TYPE: u8 = 1;

pub struct DaeServer {
    db: Database,
    config: DaeServerConfig,
}

impl DaeServer {
    pub fn new(db: Database, config: DaeServerConfig) -> Self {
        Self { db, config }
    }

    /// Bind UDP/3799 with a tuned receive buffer, then loop forever handling
    /// one inbound packet at a time. Malformed packets and packets from an
    /// address with no matching router are dropped without a reply.
    pub async fn run(self) -> DaeServerResult<()> {
        let socket = Arc::new(self.bind()?);
        info_bound(&self.config);
        let mut buf = vec![0u8; 4096];
        loop {
            let (n, peer_addr) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "dae server recv_from failed");
                    continue;
                }
            };
            let bytes = buf[..n].to_vec();
            let socket = Arc::clone(&socket);
            let db = self.db.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_packet(&db, &socket, peer_addr, &bytes).await {
                    warn!(%peer_addr, %err, "dae packet handling failed");
                }
            });
        }
    }

    fn bind(&self) -> DaeServerResult<UdpSocket> {
        let domain = if self.config.bind_addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_recv_buffer_size(self.config.recv_buffer_bytes)?;
        socket.set_nonblocking(true)?;
        socket.bind(&self.config.bind_addr.into())?;
        Ok(UdpSocket::from_std(socket.into())?)
    }
}

fn info_bound(config: &DaeServerConfig) {
    tracing::info!(addr = %config.bind_addr, "dae server bound");
}

async fn handle_packet(
    db: &Database,
    socket: &UdpSocket,
    peer_addr: SocketAddr,
    bytes: &[u8],
) -> DaeServerResult<()> {
    let packet = match Packet::decode(bytes) {
        Ok(packet) => packet,
        Err(err) => {
            debug!(%peer_addr, %err, "dropping malformed dae packet");
            return Ok(());
        }
    };

    let Some(router) = queries::get_router_by_address(db.pool(), &peer_addr.ip().to_string()).await? else {
        debug!(%peer_addr, "dropping dae packet from unknown router address");
        return Ok(());
    };
    let Some(secret) = router.radius_secret.as_deref() else {
        debug!(router_id = %router.id, "dropping dae packet, router has no secret yet");
        return Ok(());
    };
    if !packet.verify_authenticator(secret.as_bytes()) {
        warn!(router_id = %router.id, %peer_addr, "dae packet failed authenticator check, dropping");
        return Ok(());
    }

    let reply = match packet.code {
        DISCONNECT_REQUEST => handle_disconnect(db, &packet).await?,
        COA_REQUEST => handle_coa(db, &packet).await?,
        other => {
            debug!(code = other, %peer_addr, "unsupported dae packet code, dropping");
            return Ok(());
        }
    };

    let wire = reply.encode(secret.as_bytes());
    socket.send_to(&wire, peer_addr).await?;
    Ok(())
}

/// §4.8: find the single active session for (user, optional session-id);
/// close it with cause "admin-reset" and ACK, or NAK if none matched.
async fn handle_disconnect(db: &Database, packet: &Packet) -> DaeServerResult<Packet> {
    let Some(user_name) = packet.attribute(TYPE_USER_NAME).and_then(Attribute::as_string) else {
        return Ok(Packet::new(DISCONNECT_NAK, packet.identifier, vec![]));
    };
    let acct_session_id = packet.attribute(TYPE_ACCT_SESSION_ID).and_then(Attribute::as_string);

    let session = queries::find_active_session(db.pool(), &user_name, acct_session_id.as_deref()).await?;
    let Some(session) = session else {
        return Ok(Packet::new(DISCONNECT_NAK, packet.identifier, vec![]));
    };

    let closed = queries::close_session(db.pool(), &session.session_id, "admin-reset").await?;
    let code = if closed { DISCONNECT_ACK } else { DISCONNECT_NAK };
    Ok(Packet::new(code, packet.identifier, vec![]))
}

/// §4.8: upsert every recognized attribute into the reply table for the
/// named user. Unrecognized attributes are ignored, not rejected.
async fn handle_coa(db: &Database, packet: &Packet) -> DaeServerResult<Packet> {
    let Some(user_name) = packet.attribute(TYPE_USER_NAME).and_then(Attribute::as_string) else {
        return Ok(Packet::new(COA_NAK, packet.identifier, vec![]));
    };

    let mut applied = false;
    if let Some(attr) = packet.attribute(TYPE_SESSION_TIMEOUT) {
        if let Some(secs) = decode_be_u32(&attr.value) {
            queries::upsert_reply_attribute(db.pool(), &user_name, ATTR_SESSION_TIMEOUT, &secs.to_string())
                .await?;
            applied = true;
        }
    }
    for attr in packet.all_attributes(VENDOR_SPECIFIC) {
        if let Some(limit) = decode_mikrotik_total_limit(&attr.value) {
            queries::upsert_reply_attribute(db.pool(), &user_name, ATTR_DATA_REMAINING, &limit.to_string())
                .await?;
            applied = true;
        }
    }

    let code = if applied { COA_ACK } else { COA_NAK };
    Ok(Packet::new(code, packet.identifier, vec![]))
}

fn decode_be_u32(value: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = value.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Unwraps a MikroTik `Mikrotik-Total-Limit` VSA: 4-byte vendor id, then one
/// or more (vendor-type, vendor-length, value) sub-TLVs.
fn decode_mikrotik_total_limit(value: &[u8]) -> Option<u64> {
    if value.len() < 4 {
        return None;
    }
    let vendor_id = u32::from_be_bytes(value[0..4].try_into().ok()?);
    if vendor_id != MIKROTIK_VENDOR_ID {
        return None;
    }
    let mut cursor = 4;
    while cursor + 2 <= value.len() {
        let sub_type = value[cursor];
        let sub_len = value[cursor + 1] as usize;
        if sub_len < 2 || cursor + sub_len > value.len() {
            return None;
        }
        let sub_value = &value[cursor + 2..cursor + sub_len];
        if sub_type == MIKROTIK_TOTAL_LIMIT_VENDOR_TYPE {
            return std::str::from_utf8(sub_value).ok()?.parse().ok();
        }
        cursor += sub_len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mikrotik_total_limit_sub_tlv() {
        let mut value = MIKROTIK_VENDOR_ID.to_be_bytes().to_vec();
        let digits = b"1073741824";
        value.push(MIKROTIK_TOTAL_LIMIT_VENDOR_TYPE);
        value.push((2 + digits.len()) as u8);
        value.extend_from_slice(digits);
        assert_eq!(decode_mikrotik_total_limit(&value), Some(1_073_741_824));
    }

    #[test]
    fn rejects_unknown_vendor_id() {
        let mut value = 99u32.to_be_bytes().to_vec();
        value.push(MIKROTIK_TOTAL_LIMIT_VENDOR_TYPE);
        value.push(6);
        value.extend_from_slice(b"12");
        assert_eq!(decode_mikrotik_total_limit(&value), None);
    }

    #[test]
    fn decodes_session_timeout_as_be_u32() {
        assert_eq!(decode_be_u32(&3600u32.to_be_bytes()), Some(3600));
        assert_eq!(decode_be_u32(&[1, 2, 3]), None);
    }
}

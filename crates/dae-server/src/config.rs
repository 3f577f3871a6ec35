//! DAE server tuning (§4.8, §6): bind address and the receive buffer size
//! tuned the way the CoA client's sibling inbound path needs it.

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct DaeServerConfig {
    pub bind_addr: SocketAddr,
    pub recv_buffer_bytes: usize,
}

impl Default for DaeServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3799".parse().unwrap(),
            recv_buffer_bytes: 1 << 20,
        }
    }
}

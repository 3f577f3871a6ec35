//! RADIUS attribute (TLV) types used by CoA/DM traffic (§4.8).
//!
//! Only the attribute set the spec enumerates is given named constructors;
//! anything else round-trips as [`Attribute::Raw`] so a CoA-Request's
//! unrecognized attributes are preserved rather than silently dropped.

/// Attribute type 1.
pub const TYPE_USER_NAME: u8 = 1;
/// Attribute type 4.
pub const TYPE_NAS_IP_ADDRESS: u8 = 4;
/// Attribute type 8.
pub const TYPE_FRAMED_IP_ADDRESS: u8 = 8;
/// Attribute type 30.
pub const TYPE_CALLED_STATION_ID: u8 = 30;
/// Attribute type 31.
pub const TYPE_CALLING_STATION_ID: u8 = 31;
/// Attribute type 32.
pub const TYPE_NAS_IDENTIFIER: u8 = 32;
/// Attribute type 44.
pub const TYPE_ACCT_SESSION_ID: u8 = 44;
/// Attribute type 27 (standard `Session-Timeout`).
pub const TYPE_SESSION_TIMEOUT: u8 = 27;

/// One decoded type-length-value attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub type_code: u8,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(type_code: u8, value: impl Into<Vec<u8>>) -> Self {
        Self {
            type_code,
            value: value.into(),
        }
    }

    pub fn string(type_code: u8, value: &str) -> Self {
        Self::new(type_code, value.as_bytes().to_vec())
    }

    pub fn ipv4(type_code: u8, addr: std::net::Ipv4Addr) -> Self {
        Self::new(type_code, addr.octets().to_vec())
    }

    pub fn as_string(&self) -> Option<String> {
        String::from_utf8(self.value.clone()).ok()
    }

    pub fn as_ipv4(&self) -> Option<std::net::Ipv4Addr> {
        if self.value.len() != 4 {
            return None;
        }
        Some(std::net::Ipv4Addr::new(
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
        ))
    }

    /// Encoded TLV length: type(1) + length(1) + value.
    pub fn wire_len(&self) -> usize {
        2 + self.value.len()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.type_code);
        out.push(self.wire_len() as u8);
        out.extend_from_slice(&self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_attribute_round_trips() {
        let attr = Attribute::string(TYPE_USER_NAME, "alice");
        assert_eq!(attr.as_string().as_deref(), Some("alice"));
    }

    #[test]
    fn ipv4_attribute_round_trips() {
        let addr = std::net::Ipv4Addr::new(10, 0, 0, 1);
        let attr = Attribute::ipv4(TYPE_NAS_IP_ADDRESS, addr);
        assert_eq!(attr.as_ipv4(), Some(addr));
    }

    #[test]
    fn wire_len_includes_type_and_length_bytes() {
        let attr = Attribute::string(TYPE_USER_NAME, "ab");
        assert_eq!(attr.wire_len(), 4);
    }
}

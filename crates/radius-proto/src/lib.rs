//! RADIUS CoA/DM packet codec (§4.8, §6): code/identifier/length/
//! authenticator/TLV attributes, shared by the outbound `coa-client` and
//! the inbound `dae-server`.

mod attribute;
mod code;
mod error;
mod packet;

pub use attribute::{
    Attribute, TYPE_ACCT_SESSION_ID, TYPE_CALLED_STATION_ID, TYPE_CALLING_STATION_ID,
    TYPE_FRAMED_IP_ADDRESS, TYPE_NAS_IDENTIFIER, TYPE_NAS_IP_ADDRESS, TYPE_SESSION_TIMEOUT,
    TYPE_USER_NAME,
};
pub use code::{
    code_name, is_success, ACCESS_ACCEPT, COA_ACK, COA_NAK, COA_REQUEST, DISCONNECT_ACK,
    DISCONNECT_NAK, DISCONNECT_REQUEST,
};
pub use error::{RadiusCodecError, RadiusCodecResult};
pub use packet::{Packet, AUTHENTICATOR_LEN, HEADER_LEN};

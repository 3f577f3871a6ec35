//! RADIUS packet codes relevant to CoA/DAE (RFC 5176, §4.8/§6).

/// Code 40: inbound Disconnect-Request, or outbound when the core wants a
/// router to drop a session (`coa-client`'s disconnect path).
pub const DISCONNECT_REQUEST: u8 = 40;
/// Code 41: success reply to a Disconnect-Request.
pub const DISCONNECT_ACK: u8 = 41;
/// Code 42: failure reply to a Disconnect-Request.
pub const DISCONNECT_NAK: u8 = 42;
/// Code 43: inbound or outbound CoA-Request (mid-session attribute update).
pub const COA_REQUEST: u8 = 43;
/// Code 44: success reply to a CoA-Request.
pub const COA_ACK: u8 = 44;
/// Code 45: failure reply to a CoA-Request.
pub const COA_NAK: u8 = 45;
/// Code 2: Access-Accept. Not sent by this core, but accepted as a success
/// code on replies per §4.8's "success iff response code = Access-Accept /
/// CoA-ACK" wording — some NAS implementations reply Access-Accept to a
/// CoA-Request instead of the RFC 5176 CoA-ACK.
pub const ACCESS_ACCEPT: u8 = 2;

pub fn code_name(code: u8) -> &'static str {
    match code {
        DISCONNECT_REQUEST => "Disconnect-Request",
        DISCONNECT_ACK => "Disconnect-ACK",
        DISCONNECT_NAK => "Disconnect-NAK",
        COA_REQUEST => "CoA-Request",
        COA_ACK => "CoA-ACK",
        COA_NAK => "CoA-NAK",
        ACCESS_ACCEPT => "Access-Accept",
        _ => "Unknown",
    }
}

/// Whether `code` represents a successful response to whichever request
/// `code` answers (a Disconnect-ACK answers a Disconnect-Request, a
/// CoA-ACK or Access-Accept answers a CoA-Request).
pub fn is_success(code: u8) -> bool {
    matches!(code, DISCONNECT_ACK | COA_ACK | ACCESS_ACCEPT)
}

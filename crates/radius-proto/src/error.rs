use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadiusCodecError {
    #[error("packet shorter than the 20-byte minimum ({0} bytes)")]
    TooShort(usize),

    #[error("length field ({declared}) does not match packet size ({actual})")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("attribute TLV walk overran the payload")]
    AttributeOverrun,

    #[error("attribute {0} has an invalid length byte")]
    InvalidAttributeLength(u8),
}

impl RadiusCodecError {
    pub fn kind(&self) -> control_core::ErrorKind {
        control_core::ErrorKind::Transport
    }
}

pub type RadiusCodecResult<T> = Result<T, RadiusCodecError>;

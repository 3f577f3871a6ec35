/// The logical error taxonomy every crate-local `thiserror` enum classifies
/// into (see `ERROR HANDLING DESIGN` in `SPEC_FULL.md`). Crates do not share
/// one error type; they each define their own enum and implement
/// `fn kind(&self) -> ErrorKind` so callers across crate boundaries can make
/// the same propagation decisions (retry, surface, drop) without downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Underlying I/O failure. Connection-level transports trigger cleanup.
    Transport,
    /// Deadline exceeded. Background state (e.g. a pending command) is removed.
    Timeout,
    /// No heartbeat or no registry fact; failed without attempting the network.
    RouterOffline,
    /// The router (or another remote peer) returned a structured error.
    RemoteError,
    /// Authentication/authorization failure.
    Policy,
    /// Invariant breach; no state was mutated.
    Conflict,
    /// Unrecoverable bug. Logged at error level; the process continues.
    Internal,
}

impl ErrorKind {
    /// Whether an error of this kind is safe to retry (timeouts and
    /// transport failures are transient; policy/conflict/internal are not).
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeout_are_retryable() {
        assert!(ErrorKind::Transport.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Policy.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
        assert!(!ErrorKind::RouterOffline.is_retryable());
        assert!(!ErrorKind::RemoteError.is_retryable());
    }
}

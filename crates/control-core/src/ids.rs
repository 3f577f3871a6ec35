use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies one running control-plane process.
///
/// Used as the owner value in connection-registry facts and as the prefix of
/// every command-id this instance issues. Defaults to
/// `<hostname>-<pid>-<rand8>` (§6) but can be pinned via configuration for
/// deterministic deployments (e.g. StatefulSet pod names).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// `<hostname>-<pid>-<rand8>`, the default from §6.
    pub fn generate() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        let pid = std::process::id();
        let rand8: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Self(format!("{hostname}-{pid}-{rand8}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis()
}

static COMMAND_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `<instance-prefix>-<time-ms>-<counter>` (§4.4). Unique within this
/// instance's lifetime: the counter is monotonic and process-local, so even
/// two calls within the same millisecond never collide.
pub fn generate_command_id(instance: &InstanceId) -> String {
    let counter = COMMAND_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{instance}-{}-{counter}", now_ms())
}

/// `<router-id>-<time-ms>-<random>` (§4.5).
pub fn generate_tunnel_session_id(router_id: &str) -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{router_id}-{}-{random}", now_ms())
}

/// A cryptographically random RADIUS shared secret, synthesized the first
/// time a router connects without one (§4.1).
pub fn generate_router_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_are_unique_within_one_instance() {
        let instance = InstanceId::new("inst-a");
        let a = generate_command_id(&instance);
        let b = generate_command_id(&instance);
        assert_ne!(a, b);
        assert!(a.starts_with("inst-a-"));
    }

    #[test]
    fn tunnel_session_id_carries_router_prefix() {
        let id = generate_tunnel_session_id("router-42");
        assert!(id.starts_with("router-42-"));
    }

    #[test]
    fn router_secret_is_nonempty_and_varies() {
        let a = generate_router_secret();
        let b = generate_router_secret();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}

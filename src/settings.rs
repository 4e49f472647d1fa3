//! Token-ring application settings
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::MemberId;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_PORT: &str = "50000";
pub const DEFAULT_REGISTRY_PATH: &str = "ports.txt";
pub const DEFAULT_AUDIT_LOG_PATH: &str = "log";

/// Timing and resilience knobs for the forwarding and request loops
#[derive(Clone, Debug)]
pub struct RingSettings {
    // How often the forwarding loop checks for a held token
    pub forward_interval_ms: u64,

    // How often the request generator asks for the critical section
    pub request_interval_ms: u64,

    // Per-call timeout for outbound token hand-offs
    pub rpc_timeout_ms: u64,

    // Consecutive failures before a successor is skipped
    pub max_send_failures: u32,

    // How long a skipped successor stays skipped before being retried
    pub suspect_timeout_secs: u64,
}

impl Default for RingSettings {
    fn default() -> Self {
        Self {
            forward_interval_ms: 100,
            request_interval_ms: 10_000,
            rpc_timeout_ms: 2_000,
            max_send_failures: 3,
            suspect_timeout_secs: 30,
        }
    }
}

impl RingSettings {
    pub fn forward_interval(&self) -> Duration {
        Duration::from_millis(self.forward_interval_ms)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn suspect_timeout(&self) -> Duration {
        Duration::from_secs(self.suspect_timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // Fixed member id (and port); allocated from the registry when absent
    pub member_id: Option<MemberId>,

    // First id handed out when the registry is empty
    pub base_port: u16,

    // Host used to reach every peer's RPC endpoint
    pub peer_host: String,

    // Shared append-only membership file
    pub registry_path: PathBuf,

    // Append-only audit log of transfers and critical sections
    pub audit_log_path: PathBuf,

    // Emit logs as JSON
    pub log_json: bool,

    pub ring: RingSettings,
}

impl Settings {
    pub fn base_member(&self) -> MemberId {
        MemberId::new(self.base_port)
    }
}

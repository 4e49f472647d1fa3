//! CLI for this application
//!
use std::path::PathBuf;

use crate::registry::MemberId;
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "127.0.0.1",
        env("TOKENRING_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // Member id; doubles as the listen port
    #[clap(
        long,
        env("TOKENRING_MEMBER_ID"),
        help = "Fixed member id (and port). If empty, the next free id is taken from the registry"
    )]
    pub member_id: Option<u16>,

    // First id handed out on an empty registry
    #[clap(
        long,
        default_value = settings::DEFAULT_BASE_PORT,
        env("TOKENRING_BASE_PORT"),
        help = "Member id assigned to the first registrant"
    )]
    pub base_port: u16,

    // Host where peers are reached
    #[clap(
        long,
        default_value = "localhost",
        env("TOKENRING_PEER_HOST"),
        help = "Host used to reach peer endpoints (http://<peer-host>:<member-id>)"
    )]
    pub peer_host: String,

    #[clap(
        long,
        default_value = settings::DEFAULT_REGISTRY_PATH,
        env("TOKENRING_REGISTRY_PATH"),
        help = "Shared membership registry file"
    )]
    pub registry_path: PathBuf,

    #[clap(
        long,
        default_value = settings::DEFAULT_AUDIT_LOG_PATH,
        env("TOKENRING_AUDIT_LOG_PATH"),
        help = "Audit log file for transfers and critical sections"
    )]
    pub audit_log_path: PathBuf,

    #[clap(
        long,
        default_value = "100",
        env("TOKENRING_FORWARD_INTERVAL_MS"),
        help = "Interval in milliseconds between token forwarding attempts"
    )]
    pub forward_interval_ms: u64,

    #[clap(
        long,
        default_value = "10000",
        env("TOKENRING_REQUEST_INTERVAL_MS"),
        help = "Interval in milliseconds between critical-section requests"
    )]
    pub request_interval_ms: u64,

    #[clap(
        long,
        default_value = "2000",
        env("TOKENRING_RPC_TIMEOUT_MS"),
        help = "Timeout in milliseconds for each outbound token hand-off"
    )]
    pub rpc_timeout_ms: u64,

    #[clap(
        long,
        default_value = "3",
        env("TOKENRING_MAX_SEND_FAILURES"),
        help = "Consecutive failures before a successor is skipped"
    )]
    pub max_send_failures: u32,

    #[clap(
        long,
        default_value = "30",
        env("TOKENRING_SUSPECT_TIMEOUT_SECS"),
        help = "Seconds a skipped successor stays skipped"
    )]
    pub suspect_timeout_secs: u64,

    #[clap(long, env("TOKENRING_LOG_JSON"), help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            listen_address: self.listen_address,
            member_id: self.member_id.map(MemberId::new),
            base_port: self.base_port,
            peer_host: self.peer_host,
            registry_path: self.registry_path,
            audit_log_path: self.audit_log_path,
            log_json: self.log_json,
            ring: settings::RingSettings {
                forward_interval_ms: self.forward_interval_ms,
                request_interval_ms: self.request_interval_ms,
                rpc_timeout_ms: self.rpc_timeout_ms,
                max_send_failures: self.max_send_failures,
                suspect_timeout_secs: self.suspect_timeout_secs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_into_settings() {
        let cli = Cli::parse_from(["tokenring"]);
        let settings = cli.into_settings();
        assert_eq!(settings.member_id, None);
        assert_eq!(settings.base_member(), MemberId::new(50000));
        assert_eq!(settings.registry_path, PathBuf::from("ports.txt"));
        assert_eq!(settings.ring.forward_interval_ms, 100);
        assert_eq!(settings.ring.max_send_failures, 3);
    }

    #[test]
    fn test_explicit_member_id() {
        let cli = Cli::parse_from([
            "tokenring",
            "--member-id",
            "50007",
            "--forward-interval-ms",
            "500",
        ]);
        let settings = cli.into_settings();
        assert_eq!(settings.member_id, Some(MemberId::new(50007)));
        assert_eq!(settings.ring.forward_interval_ms, 500);
    }
}

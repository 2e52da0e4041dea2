//! Overlay-wide constants and per-node runtime configuration.

use std::time::Duration;

/// Bucket capacity and result-set size.
pub const K: usize = 20;
/// Lookup concurrency degree.
pub const ALPHA: usize = 3;
/// Node identifier length in bytes.
pub const ID_BYTES: usize = 32;
/// Node identifier length in bits.
pub const ID_BITS: usize = ID_BYTES * 8;
/// `FW_PENALTY = 2^(ID_BITS+1)` strictly dominates any 256-bit XOR distance.
/// It does not fit any native integer type, so it is never materialised as
/// a number: `domain::services::sorting` implements the same ordering by
/// comparing `(!well_connected, distance)` tuples, which is equivalent to
/// adding this penalty before comparing.
/// Base wait used by lookup iterations and shortlist completion polling.
pub const SLEEP_WAIT: Duration = Duration::from_secs(1);
/// Steady-state bucket refresh interval.
pub const BUCKET_REFRESH: Duration = Duration::from_secs(1200);
/// Firewall re-check interval while marked firewalled.
pub const FIREWALL_CHECK: Duration = Duration::from_secs(3600);
/// Default main protocol port; the firewall-probe socket binds `PORT + 1`.
pub const PORT: u16 = 7339;
/// Outstanding-RPC garbage-collection horizon.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on the request-handler worker pool.
pub const WORKERS: usize = 40;
/// Maximum framed message size in bytes.
pub const MAX_MSG_SIZE: usize = 3072;
/// Idle-connection eviction horizon.
pub const REUSE_TIME: Duration = Duration::from_secs(30);
/// Per-I/O-operation timeout.
pub const TIMEOUT: Duration = Duration::from_secs(5);
/// TCP listen backlog.
pub const BACKLOG: u32 = 100;

/// Shared 32-byte secret segregating overlays that share this wire protocol.
///
/// Operators of a given overlay must all configure the same value; it is
/// not a cryptographic identity, only a segregation tag (see
/// `wire::message::hashed_rpc_id`).
pub const NETWORK_ID: [u8; 32] = [
    0xc4, 0x82, 0x7b, 0x0e, 0xf3, 0x99, 0x9f, 0x10, 0x2e, 0x6d, 0x3d, 0x12, 0xef, 0x33, 0x19, 0x5b,
    0x51, 0xac, 0x14, 0x47, 0xc9, 0x8f, 0x74, 0xb5, 0xb2, 0x7a, 0xb6, 0x84, 0x91, 0x24, 0xac, 0x03,
];

/// Re-insertion offset used when an unsolicited, liveness-proven peer
/// evicts the tail of a full bucket (see `domain::routing_table::bucket`).
/// Resolves the spec's "⌊K/4⌋ vs ⌊3K/4⌋" open question in favour of
/// the head-biased value.
pub const EVICTION_REINSERT_INDEX: usize = K / 4;

/// Per-node runtime configuration: listening address and an optional
/// explicit public-address override (the node still trusts what a
/// bootstrap peer reports via `CLI_ADDR`, but logs a warning and keeps
/// the operator's configured value on disagreement).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_host: std::net::IpAddr,
    pub port: u16,
    pub bootstrap: Option<(String, u16)>,
    pub public_v4_override: Option<[u8; 4]>,
    pub public_v6_override: Option<[u8; 16]>,
    pub k: usize,
    pub alpha: usize,
    pub rpc_timeout: Duration,
    pub sleep_wait: Duration,
    pub reuse_time: Duration,
    pub io_timeout: Duration,
    pub max_msg_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_host: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port: PORT,
            bootstrap: None,
            public_v4_override: None,
            public_v6_override: None,
            k: K,
            alpha: ALPHA,
            rpc_timeout: RPC_TIMEOUT,
            sleep_wait: SLEEP_WAIT,
            reuse_time: REUSE_TIME,
            io_timeout: TIMEOUT,
            max_msg_size: MAX_MSG_SIZE,
        }
    }
}

impl NodeConfig {
    /// Smaller timeouts and an ephemeral loopback port, for fast tests.
    pub fn for_testing(port: u16) -> Self {
        Self {
            bind_host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port,
            rpc_timeout: Duration::from_millis(500),
            sleep_wait: Duration::from_millis(50),
            reuse_time: Duration::from_secs(2),
            io_timeout: Duration::from_millis(300),
            ..Self::default()
        }
    }

    /// Loads a `NodeConfig` from a TOML file, falling back to defaults
    /// for any field the file omits.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        #[derive(serde::Deserialize, Default)]
        #[serde(default)]
        struct Raw {
            bind_host: Option<String>,
            port: Option<u16>,
            bootstrap_host: Option<String>,
            bootstrap_port: Option<u16>,
            public_v4: Option<[u8; 4]>,
        }
        let raw: Raw = toml::from_str(s)?;
        let mut cfg = NodeConfig::default();
        if let Some(h) = raw.bind_host {
            if let Ok(ip) = h.parse() {
                cfg.bind_host = ip;
            }
        }
        if let Some(p) = raw.port {
            cfg.port = p;
        }
        if let (Some(h), Some(p)) = (raw.bootstrap_host, raw.bootstrap_port) {
            cfg.bootstrap = Some((h, p));
        }
        cfg.public_v4_override = raw.public_v4;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_reinsert_index_is_k_over_4() {
        assert_eq!(EVICTION_REINSERT_INDEX, 5);
    }

    #[test]
    fn test_from_toml_str_defaults_when_empty() {
        let cfg = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.port, PORT);
    }

    #[test]
    fn test_from_toml_str_overrides() {
        let cfg = NodeConfig::from_toml_str("port = 9000\nbootstrap_host = \"1.2.3.4\"\nbootstrap_port = 9001\n").unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.bootstrap, Some(("1.2.3.4".to_string(), 9001)));
    }
}

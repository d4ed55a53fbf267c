//! Control plane configuration
//!
//! YAML file layout (every section optional):
//!
//! ```yaml
//! ngap:
//!   addr: 0.0.0.0:38412
//! gtpc:
//!   addr: 0.0.0.0:2123
//! pfcp:
//!   local_addr: 0.0.0.0:0
//!   upf_addr: 127.0.0.1:8805
//!   response_timeout_ms: 5000
//! ue_pool:
//!   first: 10.0.0.1
//!   last: 10.0.0.254
//! subscribers:
//!   - imsi: "001010123456789"
//!     secret: secret123
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpConfig {
    pub ngap: NgapConfig,
    pub gtpc: GtpcConfig,
    pub pfcp: PfcpConfig,
    pub ue_pool: UePoolConfig,
    pub qos: QosConfig,
    pub subscribers: Vec<SubscriberEntry>,
    pub balances: Vec<BalanceEntry>,
    pub events: EventConfig,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            ngap: NgapConfig::default(),
            gtpc: GtpcConfig::default(),
            pfcp: PfcpConfig::default(),
            ue_pool: UePoolConfig::default(),
            qos: QosConfig::default(),
            subscribers: vec![
                SubscriberEntry::new("001010123456789", "secret123"),
                SubscriberEntry::new("001010987654321", "pass456"),
                SubscriberEntry::new("001010111222333", "test789"),
            ],
            balances: vec![BalanceEntry {
                imsi: "001010123456789".to_string(),
                balance_mb: 100,
            }],
            events: EventConfig::default(),
        }
    }
}

impl CpConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

/// Registration listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgapConfig {
    pub addr: SocketAddr,
}

impl Default for NgapConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 38412)),
        }
    }
}

/// Session listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GtpcConfig {
    pub addr: SocketAddr,
}

impl Default for GtpcConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], mvc_gtp::GTPV2_C_UDP_PORT)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfcpConfig {
    pub local_addr: SocketAddr,
    pub upf_addr: SocketAddr,
    pub response_timeout_ms: u64,
}

impl PfcpConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for PfcpConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            upf_addr: SocketAddr::from(([127, 0, 0, 1], mvc_pfcp::PFCP_UDP_PORT)),
            response_timeout_ms: 5000,
        }
    }
}

/// Inclusive UE address range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UePoolConfig {
    pub first: Ipv4Addr,
    pub last: Ipv4Addr,
}

impl Default for UePoolConfig {
    fn default() -> Self {
        Self {
            first: Ipv4Addr::new(10, 0, 0, 1),
            last: Ipv4Addr::new(10, 0, 0, 254),
        }
    }
}

/// Default bearer QoS applied to new sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QosConfig {
    pub qci: u8,
    pub arp_priority: u8,
    pub preemption_capability: bool,
    pub preemption_vulnerability: bool,
    pub mbr_ul_kbps: u64,
    pub mbr_dl_kbps: u64,
    pub gbr_ul_kbps: u64,
    pub gbr_dl_kbps: u64,
    pub bearer_id: u8,
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            qci: 9,
            arp_priority: 1,
            preemption_capability: false,
            preemption_vulnerability: false,
            mbr_ul_kbps: 100_000,
            mbr_dl_kbps: 100_000,
            gbr_ul_kbps: 0,
            gbr_dl_kbps: 0,
            bearer_id: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberEntry {
    pub imsi: String,
    pub secret: String,
}

impl SubscriberEntry {
    pub fn new(imsi: &str, secret: &str) -> Self {
        Self {
            imsi: imsi.to_string(),
            secret: secret.to_string(),
        }
    }
}

/// Initial quota balance in MB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub imsi: String,
    pub balance_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

//! Router configuration
//!
//! [`RouterConfig`] is the per-router settings surface. It deserializes
//! from the scenario file and is checked once with
//! [`validate`](RouterConfig::validate) before any host is built.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::message::HostId;

/// Order in which competing messages are offered to a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QueueMode {
    /// Shuffled, reseeded from the simulated clock on every call
    Random,
    /// Oldest receive time first
    #[default]
    Fifo,
    /// Newest receive time first
    Lifo,
    /// Most remaining TTL first
    HighTtlFirst,
    /// Least remaining TTL first
    LowTtlFirst,
}

impl TryFrom<u8> for QueueMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QueueMode::Random),
            2 => Ok(QueueMode::Fifo),
            3 => Ok(QueueMode::Lifo),
            4 => Ok(QueueMode::HighTtlFirst),
            5 => Ok(QueueMode::LowTtlFirst),
            other => Err(ConfigError::UnknownQueueMode(other)),
        }
    }
}

impl From<QueueMode> for u8 {
    fn from(mode: QueueMode) -> u8 {
        match mode {
            QueueMode::Random => 1,
            QueueMode::Fifo => 2,
            QueueMode::Lifo => 3,
            QueueMode::HighTtlFirst => 4,
            QueueMode::LowTtlFirst => 5,
        }
    }
}

/// Battery model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Starting charge
    pub initial: f64,
    /// Charge spent per neighbour scan
    pub scan: f64,
    /// Charge spent answering a scan when a peer opens a link to us
    pub scan_response: f64,
    /// Charge spent per second while sending or receiving
    pub transmit: f64,
    /// Seconds between scans
    pub scan_interval: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial: 4800.0,
            scan: 0.1,
            scan_response: 0.1,
            transmit: 0.2,
            scan_interval: 30.0,
        }
    }
}

/// Transfer acceptance rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Never send to these hosts
    pub deny_send_to: Vec<HostId>,
    /// Never accept from these hosts
    pub deny_receive_from: Vec<HostId>,
    /// Refuse messages larger than this many bytes
    pub max_message_size: Option<u64>,
    /// Refuse messages that have already taken this many hops
    pub max_hops: Option<usize>,
}

impl PolicyConfig {
    pub fn is_permissive(&self) -> bool {
        self == &PolicyConfig::default()
    }
}

/// Per-router settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Buffer capacity in bytes
    pub buffer_size: u64,
    /// Lifetime stamped on created messages, in minutes; `None` never expires
    pub message_ttl: Option<u32>,
    pub queue_mode: QueueMode,
    /// Drop our copy when a final recipient tells us it already has it
    pub delete_delivered: bool,
    /// Seconds between expiry sweeps
    pub ttl_check_interval: f64,
    /// Battery model, absent for unlimited energy
    pub energy: Option<EnergyConfig>,
    pub policy: PolicyConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            buffer_size: u64::MAX,
            message_ttl: None,
            queue_mode: QueueMode::Fifo,
            delete_delivered: false,
            ttl_check_interval: 60.0,
            energy: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Config with a bounded buffer and otherwise default settings
    pub fn bounded(buffer_size: u64) -> Self {
        Self {
            buffer_size,
            ..Default::default()
        }
    }

    /// Config for handheld devices: 5 MB buffer, 5 hour TTL, battery model
    pub fn handheld() -> Self {
        Self {
            buffer_size: 5_000_000,
            message_ttl: Some(300),
            energy: Some(EnergyConfig::default()),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, minutes: u32) -> Self {
        self.message_ttl = Some(minutes);
        self
    }

    pub fn with_queue_mode(mut self, mode: QueueMode) -> Self {
        self.queue_mode = mode;
        self
    }

    pub fn with_delete_delivered(mut self, enabled: bool) -> Self {
        self.delete_delivered = enabled;
        self
    }

    pub fn with_energy(mut self, energy: EnergyConfig) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Reject settings the core cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.buffer_size == 0 {
            return Err(ConfigError::NonPositiveBufferSize);
        }
        if self.ttl_check_interval <= 0.0 || self.ttl_check_interval.is_nan() {
            return Err(ConfigError::NonPositiveTtlInterval(self.ttl_check_interval));
        }
        if let Some(energy) = &self.energy {
            for (field, value) in [
                ("initial", energy.initial),
                ("scan", energy.scan),
                ("scan_response", energy.scan_response),
                ("transmit", energy.transmit),
                ("scan_interval", energy.scan_interval),
            ] {
                if value < 0.0 {
                    return Err(ConfigError::NegativeEnergy { field, value });
                }
            }
        }
        Ok(())
    }

    /// Legal settings that are probably a mistake
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.message_ttl == Some(0) {
            warnings.push(ConfigWarning::ZeroTtl);
        }
        if self.ttl_check_interval > 3600.0 {
            warnings.push(ConfigWarning::SparseTtlSweep);
        }
        if let Some(max) = self.policy.max_message_size
            && self.buffer_size != u64::MAX
            && max > self.buffer_size
        {
            warnings.push(ConfigWarning::PolicySizeExceedsBuffer);
        }
        if self.energy.as_ref().is_some_and(|e| e.initial == 0.0) {
            warnings.push(ConfigWarning::NoInitialEnergy);
        }

        warnings
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Every created message is born expired
    ZeroTtl,
    /// Expiry sweep runs less than once an hour
    SparseTtlSweep,
    /// Policy size limit is larger than the buffer
    PolicySizeExceedsBuffer,
    /// Energy model starts depleted, so nothing will ever be accepted
    NoInitialEnergy,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::ZeroTtl => write!(f, "message_ttl is zero"),
            ConfigWarning::SparseTtlSweep => {
                write!(f, "ttl_check_interval is very long (> 1h)")
            }
            ConfigWarning::PolicySizeExceedsBuffer => {
                write!(f, "policy max_message_size exceeds buffer_size")
            }
            ConfigWarning::NoInitialEnergy => write!(f, "energy.initial is zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.buffer_size, u64::MAX);
        assert_eq!(config.message_ttl, None);
        assert_eq!(config.queue_mode, QueueMode::Fifo);
        assert_eq!(config.ttl_check_interval, 60.0);
        assert!(config.validate().is_ok());
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_zero_buffer_is_misconfigured() {
        let config = RouterConfig::bounded(0);
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveBufferSize));
    }

    #[test]
    fn test_queue_mode_codes() {
        for code in 1..=5u8 {
            let mode = QueueMode::try_from(code).unwrap();
            assert_eq!(u8::from(mode), code);
        }
        assert_eq!(QueueMode::try_from(0), Err(ConfigError::UnknownQueueMode(0)));
        assert_eq!(QueueMode::try_from(6), Err(ConfigError::UnknownQueueMode(6)));
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{ "buffer_size": 1000, "message_ttl": 5, "queue_mode": 4 }"#;
        let config: RouterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.buffer_size, 1000);
        assert_eq!(config.message_ttl, Some(5));
        assert_eq!(config.queue_mode, QueueMode::HighTtlFirst);
        assert!(!config.delete_delivered);
    }

    #[test]
    fn test_unknown_queue_mode_rejected_on_load() {
        let json = r#"{ "queue_mode": 9 }"#;
        assert!(serde_json::from_str::<RouterConfig>(json).is_err());
    }

    #[test]
    fn test_negative_energy_rejected() {
        let config = RouterConfig::default().with_energy(EnergyConfig {
            transmit: -1.0,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeEnergy { field: "transmit", .. })
        ));
    }

    #[test]
    fn test_warnings() {
        let config = RouterConfig::bounded(100).with_ttl(0).with_policy(PolicyConfig {
            max_message_size: Some(500),
            ..Default::default()
        });
        let warnings = config.warnings();
        assert!(warnings.contains(&ConfigWarning::ZeroTtl));
        assert!(warnings.contains(&ConfigWarning::PolicySizeExceedsBuffer));
    }
}

//! Coordinator configuration

use crate::backend::DEFAULT_FEE_RATE;
use crate::events::DEFAULT_QUEUE_CAPACITY;
use crate::multisig::Token;
use std::path::PathBuf;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8334;

/// Server settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    /// Admin capability token; generated at startup when absent
    pub admin_token: Option<Token>,
    /// Wallet store location; memory only when absent
    pub data_dir: Option<PathBuf>,
    /// Per-session event queue length
    pub event_queue_capacity: usize,
    /// Backend fee rate per 1000 bytes
    pub fee_rate: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            admin_token: None,
            data_dir: None,
            event_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }
}

impl CoordinatorConfig {
    /// `host:port` bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8334");
        assert_eq!(config.event_queue_capacity, 64);
        assert!(config.data_dir.is_none());
        assert!(config.admin_token.is_none());
    }
}

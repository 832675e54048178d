//! Wallet configuration.

use std::time::Duration;

/// Currency parameters and synchronizer tuning.
///
/// The currency fields (`address_prefix`, `decimal_places`, `ticker`) are
/// saved with the wallet. The rest are runtime only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Varint-encoded prefix at the start of every address.
    pub address_prefix: u64,
    /// Number of decimal places in one whole coin.
    pub decimal_places: u8,
    pub ticker: String,
    /// Delay between ticks while the wallet is behind the daemon.
    pub sync_thread_interval: Duration,
    /// Delay between ticks once the daemon has no new blocks.
    pub idle_interval: Duration,
    /// How often the synchronizer asks the daemon to refresh its heights and fee.
    pub daemon_update_interval: Duration,
    pub blocks_per_daemon_request: u64,
    pub block_target_time: Duration,
    /// Coinbase outputs are only credited when this is set.
    pub scan_coinbase_transactions: bool,
    pub max_last_known_block_hashes: usize,
    pub block_hash_checkpoint_interval: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            address_prefix: 375936,
            decimal_places: 8,
            ticker: "NaCa".to_string(),
            sync_thread_interval: Duration::from_millis(10),
            idle_interval: Duration::from_secs(5),
            daemon_update_interval: Duration::from_secs(10),
            blocks_per_daemon_request: 100,
            block_target_time: Duration::from_secs(30),
            scan_coinbase_transactions: false,
            max_last_known_block_hashes: 100,
            block_hash_checkpoint_interval: 5000,
        }
    }

    pub fn with_address_prefix(mut self, prefix: u64) -> Self {
        self.address_prefix = prefix;
        self
    }

    pub fn with_decimal_places(mut self, decimal_places: u8) -> Self {
        self.decimal_places = decimal_places;
        self
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = ticker.into();
        self
    }

    pub fn with_sync_thread_interval(mut self, interval: Duration) -> Self {
        self.sync_thread_interval = interval;
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_daemon_update_interval(mut self, interval: Duration) -> Self {
        self.daemon_update_interval = interval;
        self
    }

    pub fn with_blocks_per_daemon_request(mut self, count: u64) -> Self {
        self.blocks_per_daemon_request = count.max(1);
        self
    }

    pub fn with_scan_coinbase_transactions(mut self, scan: bool) -> Self {
        self.scan_coinbase_transactions = scan;
        self
    }

    /// Atomic units in one whole coin.
    pub fn atomic_units_per_coin(&self) -> u64 {
        10u64.saturating_pow(u32::from(self.decimal_places))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.address_prefix, 375936);
        assert_eq!(config.decimal_places, 8);
        assert_eq!(config.ticker, "NaCa");
        assert_eq!(config.atomic_units_per_coin(), 100_000_000);
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_address_prefix(8411)
            .with_ticker("TRTL")
            .with_decimal_places(2)
            .with_blocks_per_daemon_request(0);

        assert_eq!(config.address_prefix, 8411);
        assert_eq!(config.ticker, "TRTL");
        assert_eq!(config.atomic_units_per_coin(), 100);
        assert_eq!(config.blocks_per_daemon_request, 1);
    }
}

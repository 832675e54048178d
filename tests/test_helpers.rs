//! Test helpers: a chain builder that pays to and spends from wallet keys,
//! and a wallet bound to a mock daemon.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tempfile::TempDir;
use wallet_backend::primitives::{
    derive_public_key, derive_secret_key, generate_key_derivation, generate_key_image,
    key_pair_from_bytes, KeyImage, PrivateKey, PublicKey,
};
use wallet_backend::{
    decode_address, Block, Config, KeyInput, KeyOutput, MockDaemon, RawTransaction, WalletBackend,
};

pub const VIDEO_SEED: &str = "video optical bowling rockets copy ointment auctions jailed gnaw bovine criminal evenings honked nostril acidic hippo usage rays needed rabbits pager deftly washing wedge acidic";
pub const VIDEO_PRIVATE_SPEND_KEY: &str = "a930cd8190bae670fc22d0e880f5d919da1e3d6da274a3c923049af1d2763901";
pub const VIDEO_PRIVATE_VIEW_KEY: &str = "5042c63c6d334124992f1dd734abf0214463cc9bf394ece3f9aacf2240097c07";
pub const VIDEO_ADDRESS: &str = "NaCar2zUqGFSGYPYzagBJEN9Tovgx8fv2dhZ5tXSGw4WAyE5TsP44JaaEkPX9zNR86bnBH7M1RJYjCC6zdFTn8Lg1atLMVHSWm";

pub const BLOCK_TIMESTAMP: u64 = 1_600_000_000;

/// Installs a test subscriber once. `RUST_LOG=wallet_backend=debug` shows the loop.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Intervals short enough for tests.
pub fn fast_config() -> Config {
    Config::default()
        .with_sync_thread_interval(Duration::from_millis(1))
        .with_idle_interval(Duration::from_millis(10))
        .with_daemon_update_interval(Duration::from_millis(10))
}

pub fn key(hex_key: &str) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_key, &mut bytes).unwrap();
    bytes
}

/// An output created by [`ChainBuilder::pay`], with what the recipient
/// needs to compute its key image.
#[derive(Debug, Clone)]
pub struct SentOutput {
    pub transaction_public_key: PublicKey,
    pub output_index: u64,
    pub output_key: PublicKey,
    pub amount: u64,
}

impl SentOutput {
    pub fn key_image(&self, private_view_key: &PrivateKey, private_spend_key: &PrivateKey) -> KeyImage {
        let derivation = generate_key_derivation(&self.transaction_public_key, private_view_key).unwrap();
        let secret = derive_secret_key(&derivation, self.output_index, private_spend_key).unwrap();
        generate_key_image(&self.output_key, &secret).unwrap()
    }
}

/// Builds transactions and blocks from a seeded RNG, so runs are repeatable.
pub struct ChainBuilder {
    rng: ChaCha20Rng,
}

impl ChainBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    fn random_bytes(&mut self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }

    /// A transaction paying each `(address, amount)` one output, in order.
    pub fn pay(&mut self, payments: &[(&str, u64)], unlock_time: u64) -> (RawTransaction, Vec<SentOutput>) {
        let tx_key = key_pair_from_bytes(&self.random_bytes());
        let mut key_outputs = Vec::new();
        let mut sent = Vec::new();

        for (index, (address, amount)) in payments.iter().enumerate() {
            let decoded = decode_address(address).unwrap();
            let derivation = generate_key_derivation(&decoded.public_view_key, &tx_key.private_key).unwrap();
            let output_key = derive_public_key(&derivation, index as u64, &decoded.public_spend_key).unwrap();

            key_outputs.push(KeyOutput {
                key: output_key,
                amount: *amount,
                global_index: Some(index as u64),
            });
            sent.push(SentOutput {
                transaction_public_key: tx_key.public_key,
                output_index: index as u64,
                output_key,
                amount: *amount,
            });
        }

        let tx = RawTransaction {
            key_outputs,
            hash: self.random_bytes(),
            transaction_public_key: tx_key.public_key,
            unlock_time,
            payment_id: None,
            key_inputs: Vec::new(),
        };
        (tx, sent)
    }

    /// Adds a spend of `key_image` (worth `amount`) to `tx`.
    pub fn spend(&mut self, tx: &mut RawTransaction, key_image: KeyImage, amount: u64) {
        tx.key_inputs.push(KeyInput {
            amount,
            key_image,
            output_indexes: vec![0],
        });
    }

    pub fn block(&mut self, height: u64, transactions: Vec<RawTransaction>) -> Block {
        Block {
            block_hash: self.random_bytes(),
            block_height: height,
            block_timestamp: BLOCK_TIMESTAMP + height * 30,
            coinbase_transaction: None,
            transactions,
        }
    }
}

fn mock_daemon() -> MockDaemon {
    MockDaemon::new("127.0.0.1", 11898).with_node_fee("NaCaNodeFeeAddress", 5000)
}

/// A wallet bound to a mock daemon, with a temp dir for wallet files.
pub struct MockWalletHelper {
    pub wallet: WalletBackend,
    pub daemon: MockDaemon,
    pub temp_dir: TempDir,
}

impl MockWalletHelper {
    pub fn from_seed(seed: &str, scan_height: u64, config: Config) -> Self {
        init_tracing();
        let daemon = mock_daemon();
        let wallet = WalletBackend::import_wallet_from_seed(Arc::new(daemon.clone()), scan_height, seed, config).unwrap();
        Self {
            wallet,
            daemon,
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// A freshly created wallet, so it only scans blocks newer than now.
    pub fn created(config: Config) -> Self {
        init_tracing();
        let daemon = mock_daemon();
        let wallet = WalletBackend::create_wallet(Arc::new(daemon.clone()), config);
        Self {
            wallet,
            daemon,
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Waits until the wallet has processed `height`.
    pub async fn wait_for_height(&self, height: u64) {
        let result = tokio::time::timeout(Duration::from_secs(10), async {
            while self.wallet.get_sync_status().wallet_block_count < height {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            result.is_ok(),
            "wallet stuck at {} waiting for {}",
            self.wallet.get_sync_status().wallet_block_count,
            height
        );
    }
}

//! Wallet backend for CryptoNote currencies.
//!
//! A wallet is one private view key shared by any number of spend key pairs
//! ("subwallets"). [`WalletBackend`] scans blocks served by a [`Daemon`] for
//! outputs sent to those keys, tracks balances and transactions, and saves
//! everything as a password-encrypted file.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wallet_backend::{Config, MockDaemon, WalletBackend};
//!
//! let daemon = Arc::new(MockDaemon::new("127.0.0.1", 11898));
//! let wallet = WalletBackend::create_wallet(daemon, Config::default());
//!
//! assert_eq!(wallet.get_wallet_count(), 1);
//! assert!(wallet.get_primary_address().starts_with("NaCa"));
//! ```

pub mod address;
pub mod backend;
pub mod config;
pub mod crypto;
pub mod daemon;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod mock_daemon;
pub mod primitives;
pub mod subwallet;
pub mod subwallets;
pub mod synchronizer;
pub mod types;
pub mod utils;
pub mod wallet_state;
mod wordlist;

pub use address::{
    create_integrated_address, decode_address, encode_address, validate_address,
    validate_addresses, validate_payment_id, DecodedAddress,
};
pub use backend::{WalletBackend, WalletEvent};
pub use config::Config;
pub use daemon::{Daemon, DaemonConnectionInfo, DaemonError, DaemonEvent, DaemonType};
pub use error::{WalletError, WalletErrorCode};
pub use keys::WalletKeys;
pub use mnemonic::{is_valid_mnemonic, is_valid_mnemonic_word};
pub use mock_daemon::MockDaemon;
pub use types::{Block, KeyInput, KeyOutput, RawTransaction, SyncStatus, Transaction, TransactionInput, Transfer};
pub use utils::pretty_print_amount;

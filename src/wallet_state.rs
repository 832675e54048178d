//! Complete wallet state and its persisted forms.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::crypto::{
    decrypt_wallet_data, encrypt_wallet_data, generate_nonce, generate_salt, NONCE_SIZE, SALT_SIZE,
};
use crate::subwallets::SubWallets;
use crate::synchronizer::WalletSynchronizer;
use crate::types::{Block, Transaction};
use crate::WalletError;

/// Version of the JSON layout.
pub const WALLET_FILE_FORMAT_VERSION: u32 = 0;

/// Version of the encrypted container around the JSON.
const CONTAINER_VERSION: u32 = 1;

/// Magic bytes identifying an encrypted wallet: "CNWB"
const MAGIC_BYTES: &[u8; 4] = b"CNWB";

/// Size of the fixed header in bytes (magic + version + salt + nonce)
const HEADER_SIZE: usize = 4 + 4 + SALT_SIZE + NONCE_SIZE; // 52 bytes

/// Currency parameters saved with the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyConfig {
    address_prefix: u64,
    decimal_places: u8,
    ticker: String,
}

impl From<&Config> for CurrencyConfig {
    fn from(config: &Config) -> Self {
        Self {
            address_prefix: config.address_prefix,
            decimal_places: config.decimal_places,
            ticker: config.ticker.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletFileRef<'a> {
    wallet_file_format_version: u32,
    sub_wallets: &'a SubWallets,
    wallet_synchronizer: &'a WalletSynchronizer,
    config: CurrencyConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletFile {
    wallet_file_format_version: u32,
    sub_wallets: SubWallets,
    wallet_synchronizer: WalletSynchronizer,
    config: Option<CurrencyConfig>,
}

#[derive(Debug, Clone)]
pub struct WalletState {
    pub sub_wallets: SubWallets,
    pub synchronizer: WalletSynchronizer,
    pub config: Config,
}

impl WalletState {
    pub fn new(sub_wallets: SubWallets, synchronizer: WalletSynchronizer, config: Config) -> Self {
        Self {
            sub_wallets,
            synchronizer,
            config,
        }
    }

    /// Scans `blocks` and returns the transactions found in them.
    pub fn apply_blocks(&mut self, blocks: &[Block]) -> Vec<Transaction> {
        self.synchronizer
            .process_blocks(blocks, &mut self.sub_wallets, &self.config)
    }

    // ========================================================================
    // REWIND / RESET
    // ========================================================================

    /// Discards every transaction and input above `height`. Returns the number
    /// of transactions removed. A height above the cursor changes nothing.
    pub fn rewind(&mut self, height: u64) -> usize {
        if height >= self.synchronizer.height() {
            return 0;
        }

        let before = self.sub_wallets.transactions().len();
        self.sub_wallets.rewind(height);
        self.synchronizer.rewind(height, &self.config);
        let removed = before - self.sub_wallets.transactions().len();

        info!(height, removed, "rewound wallet");
        removed
    }

    /// Rewinds so `height` and everything after it is scanned again.
    pub fn rescan_from(&mut self, height: u64) {
        if height < self.synchronizer.next_height() {
            self.sub_wallets.rewind(height.saturating_sub(1));
            info!(height, "rescanning for imported keys");
        }
        self.synchronizer.rescan_from(height, &self.config);
    }

    pub fn reset(&mut self, scan_height: u64, scan_timestamp: u64) {
        self.sub_wallets.reset(scan_height, scan_timestamp);
        self.synchronizer.reset(scan_height, scan_timestamp);
        info!(scan_height, scan_timestamp, "reset wallet");
    }

    // ========================================================================
    // JSON
    // ========================================================================

    /// Pretty-printed JSON with a fixed field order, so equal states give equal text.
    pub fn to_json_string(&self) -> Result<String, WalletError> {
        let file = WalletFileRef {
            wallet_file_format_version: WALLET_FILE_FORMAT_VERSION,
            sub_wallets: &self.sub_wallets,
            wallet_synchronizer: &self.synchronizer,
            config: CurrencyConfig::from(&self.config),
        };

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        file.serialize(&mut serializer)
            .map_err(|e| WalletError::ParseFailure(format!("failed to serialise wallet: {}", e)))?;

        String::from_utf8(out).map_err(|e| WalletError::ParseFailure(e.to_string()))
    }

    /// Parses wallet JSON. The currency saved in the file is kept unless
    /// `config` is given, in which case `config` is used as is.
    pub fn from_json(json: &str, config: Option<Config>) -> Result<Self, WalletError> {
        let file: WalletFile = serde_json::from_str(json)
            .map_err(|e| WalletError::ParseFailure(e.to_string()))?;

        if file.wallet_file_format_version > WALLET_FILE_FORMAT_VERSION {
            return Err(WalletError::UnsupportedWalletFileFormatVersion(
                file.wallet_file_format_version,
            ));
        }

        let config = match (config, file.config) {
            (Some(config), _) => config,
            (None, Some(saved)) => Config::default()
                .with_address_prefix(saved.address_prefix)
                .with_decimal_places(saved.decimal_places)
                .with_ticker(saved.ticker),
            (None, None) => Config::default(),
        };

        if file.wallet_synchronizer.private_view_key() != file.sub_wallets.private_view_key() {
            return Err(WalletError::ParseFailure(
                "synchronizer and subwallets disagree on the private view key".to_string(),
            ));
        }
        file.sub_wallets.validate(&config)?;

        Ok(Self::new(file.sub_wallets, file.wallet_synchronizer, config))
    }

    // ========================================================================
    // ENCRYPTED CONTAINER
    // ========================================================================

    pub fn to_encrypted_bytes(&self, password: &str) -> Result<Vec<u8>, WalletError> {
        let json = zeroize::Zeroizing::new(self.to_json_string()?);
        let salt = generate_salt();
        let nonce = generate_nonce();
        let encrypted = encrypt_wallet_data(json.as_bytes(), password.as_bytes(), &salt, &nonce)?;

        let mut contents = Vec::with_capacity(HEADER_SIZE + encrypted.len());
        contents.extend_from_slice(MAGIC_BYTES);
        contents.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        contents.extend_from_slice(&salt);
        contents.extend_from_slice(&nonce);
        contents.extend_from_slice(&encrypted);
        Ok(contents)
    }

    pub fn from_encrypted_bytes(
        contents: &[u8],
        password: &str,
        config: Option<Config>,
    ) -> Result<Self, WalletError> {
        if contents.len() < HEADER_SIZE {
            return Err(WalletError::NotAWalletFile(format!(
                "expected at least {} bytes, got {}",
                HEADER_SIZE,
                contents.len()
            )));
        }

        let (magic, rest) = contents.split_at(4);
        if magic != MAGIC_BYTES {
            return Err(WalletError::NotAWalletFile("bad magic bytes".to_string()));
        }

        let (version, rest) = rest.split_at(4);
        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(version);
        let version = u32::from_le_bytes(version_bytes);
        if version > CONTAINER_VERSION {
            return Err(WalletError::UnsupportedWalletFileFormatVersion(version));
        }

        let (salt_bytes, rest) = rest.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        salt.copy_from_slice(salt_bytes);
        nonce.copy_from_slice(nonce_bytes);

        let plaintext = decrypt_wallet_data(ciphertext, password.as_bytes(), &salt, &nonce)?;
        let json = std::str::from_utf8(&plaintext)
            .map_err(|e| WalletError::ParseFailure(e.to_string()))?;

        Self::from_json(json, config)
    }

    /// Standard base64 of the encrypted container.
    pub fn to_encrypted_string(&self, password: &str) -> Result<String, WalletError> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_encrypted_bytes(password)?))
    }

    pub fn from_encrypted_string(
        data: &str,
        password: &str,
        config: Option<Config>,
    ) -> Result<Self, WalletError> {
        let contents = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| WalletError::NotAWalletFile(format!("not base64: {}", e)))?;
        Self::from_encrypted_bytes(&contents, password, config)
    }

    // ========================================================================
    // FILE I/O
    // ========================================================================

    /// Writes the encrypted wallet through a temporary file and a rename, so
    /// a crash never leaves a half-written wallet behind.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, password: &str) -> Result<(), WalletError> {
        let path = path.as_ref();
        let contents = self.to_encrypted_bytes(password)?;

        let temp_path = path.with_extension("tmp");
        let _ = fs::remove_file(&temp_path);

        #[cfg(unix)]
        let mut temp_file = {
            use std::os::unix::fs::OpenOptionsExt;
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&temp_path)?
        };

        #[cfg(not(unix))]
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        if let Err(e) = temp_file.write_all(&contents).and_then(|_| temp_file.sync_all()) {
            drop(temp_file);
            let _ = fs::remove_file(&temp_path);
            return Err(WalletError::Filesystem(e));
        }
        drop(temp_file);

        match fs::rename(&temp_path, path) {
            Ok(()) => {
                info!(path = %path.display(), "saved wallet");
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(WalletError::Filesystem(e))
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(
        path: P,
        password: &str,
        config: Option<Config>,
    ) -> Result<Self, WalletError> {
        let path = path.as_ref();

        let mut file = fs::File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let state = Self::from_encrypted_bytes(&contents, password, config)?;
        info!(path = %path.display(), "loaded wallet");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::WalletKeys;

    fn state() -> WalletState {
        let config = Config::default();
        let keys = WalletKeys::generate();
        let sub_wallets = SubWallets::new(&keys, 0, 0, &config);
        let synchronizer = WalletSynchronizer::new(0, 0, keys.view.private_key);
        WalletState::new(sub_wallets, synchronizer, config)
    }

    #[test]
    fn test_debug_hides_private_keys() {
        let state = state();
        let debug = format!("{state:?}");
        let view_key = *state.synchronizer.private_view_key();

        assert!(!debug.contains(&hex::encode(view_key)));
        assert!(!debug.contains(&format!("{view_key:?}")));
        let primary = state.sub_wallets.primary().unwrap();
        let private_spend_key = primary.private_spend_key().unwrap();
        assert!(!debug.contains(&hex::encode(private_spend_key)));
        assert!(!debug.contains(&format!("{private_spend_key:?}")));
    }

    #[test]
    fn test_json_is_stable() {
        let state = state();
        let json = state.to_json_string().unwrap();
        assert!(json.starts_with("{\n    \"walletFileFormatVersion\": 0,"));

        let restored = WalletState::from_json(&json, None).unwrap();
        assert_eq!(restored.to_json_string().unwrap(), json);
    }

    #[test]
    fn test_newer_format_rejected() {
        let json = state()
            .to_json_string()
            .unwrap()
            .replacen("\"walletFileFormatVersion\": 0", "\"walletFileFormatVersion\": 99", 1);
        assert!(matches!(
            WalletState::from_json(&json, None),
            Err(WalletError::UnsupportedWalletFileFormatVersion(99))
        ));
    }

    #[test]
    fn test_saved_currency_kept() {
        let mut state = state();
        state.config = Config::default().with_ticker("TRTL").with_decimal_places(2);
        let json = state.to_json_string().unwrap();

        let restored = WalletState::from_json(&json, None).unwrap();
        assert_eq!(restored.config.ticker, "TRTL");
        assert_eq!(restored.config.decimal_places, 2);
    }

    #[test]
    fn test_garbage_is_parse_failure() {
        assert!(matches!(
            WalletState::from_json("{\"hello\": 1}", None),
            Err(WalletError::ParseFailure(_))
        ));
    }

    #[test]
    fn test_header_checks() {
        assert!(matches!(
            WalletState::from_encrypted_bytes(b"CNWB", "", None),
            Err(WalletError::NotAWalletFile(_))
        ));
        assert!(matches!(
            WalletState::from_encrypted_bytes(&[0u8; 100], "", None),
            Err(WalletError::NotAWalletFile(_))
        ));

        let mut future = Vec::new();
        future.extend_from_slice(b"CNWB");
        future.extend_from_slice(&7u32.to_le_bytes());
        future.extend_from_slice(&[0u8; 80]);
        assert!(matches!(
            WalletState::from_encrypted_bytes(&future, "", None),
            Err(WalletError::UnsupportedWalletFileFormatVersion(7))
        ));
    }
}

//! The set of subwallets sharing one view key, and the wallet's transactions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::address::{encode_address, validate_address};
use crate::config::Config;
use crate::keys::WalletKeys;
use crate::primitives::{
    generate_keys, secret_key_to_public_key, Hash, KeyImage, PrivateKey, PublicKey,
};
use crate::subwallet::SubWallet;
use crate::types::{hex_vec, Transaction, TransactionInput};
use crate::WalletError;

#[derive(Clone)]
pub struct SubWallets {
    /// Insertion order. The primary is always first.
    sub_wallets: Vec<SubWallet>,
    transactions: Vec<Transaction>,
    private_view_key: Zeroizing<PrivateKey>,
    public_view_key: PublicKey,
    is_view_wallet: bool,
}

impl SubWallets {
    /// A wallet holding just the primary subwallet of `keys`.
    pub fn new(keys: &WalletKeys, scan_height: u64, scan_timestamp: u64, config: &Config) -> Self {
        let address = encode_address(
            &keys.spend.public_key,
            &keys.view.public_key,
            None,
            config.address_prefix,
        );
        let primary = SubWallet::new(
            keys.spend.public_key,
            Some(keys.spend.private_key),
            address,
            scan_height,
            scan_timestamp,
            true,
            0,
        );

        Self {
            sub_wallets: vec![primary],
            transactions: Vec::new(),
            private_view_key: Zeroizing::new(keys.view.private_key),
            public_view_key: keys.view.public_key,
            is_view_wallet: false,
        }
    }

    /// A view wallet watching `address`.
    pub fn new_view_wallet(
        private_view_key: &PrivateKey,
        address: &str,
        scan_height: u64,
        scan_timestamp: u64,
        config: &Config,
    ) -> Result<Self, WalletError> {
        let decoded = validate_address(address, false, config)?;
        let public_view_key = secret_key_to_public_key(private_view_key)?;
        if public_view_key != decoded.public_view_key {
            return Err(WalletError::InvalidKeyFormat(
                "private view key does not belong to the address".to_string(),
            ));
        }

        let primary = SubWallet::new(
            decoded.public_spend_key,
            None,
            address.to_string(),
            scan_height,
            scan_timestamp,
            true,
            0,
        );

        Ok(Self {
            sub_wallets: vec![primary],
            transactions: Vec::new(),
            private_view_key: Zeroizing::new(*private_view_key),
            public_view_key,
            is_view_wallet: true,
        })
    }

    pub fn is_view_wallet(&self) -> bool {
        self.is_view_wallet
    }

    pub fn private_view_key(&self) -> &PrivateKey {
        &self.private_view_key
    }

    pub fn public_view_key(&self) -> &PublicKey {
        &self.public_view_key
    }

    pub fn count(&self) -> usize {
        self.sub_wallets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubWallet> {
        self.sub_wallets.iter()
    }

    pub fn primary(&self) -> Option<&SubWallet> {
        self.sub_wallets.iter().find(|w| w.is_primary_address())
    }

    pub fn addresses(&self) -> Vec<String> {
        self.sub_wallets.iter().map(|w| w.address().to_string()).collect()
    }

    pub fn public_spend_keys(&self) -> Vec<PublicKey> {
        self.sub_wallets.iter().map(|w| *w.public_spend_key()).collect()
    }

    pub fn contains(&self, public_spend_key: &PublicKey) -> bool {
        self.get(public_spend_key).is_some()
    }

    pub fn get(&self, public_spend_key: &PublicKey) -> Option<&SubWallet> {
        self.sub_wallets
            .iter()
            .find(|w| w.public_spend_key() == public_spend_key)
    }

    fn get_mut(&mut self, public_spend_key: &PublicKey) -> Option<&mut SubWallet> {
        self.sub_wallets
            .iter_mut()
            .find(|w| w.public_spend_key() == public_spend_key)
    }

    /// The subwallet behind a standard address of this wallet.
    pub fn find_by_address(&self, address: &str, config: &Config) -> Result<&SubWallet, WalletError> {
        let decoded = validate_address(address, false, config)?;
        if decoded.public_view_key != self.public_view_key {
            return Err(WalletError::AddressNotInWallet);
        }
        self.get(&decoded.public_spend_key)
            .ok_or(WalletError::AddressNotInWallet)
    }

    fn next_wallet_index(&self) -> u64 {
        self.sub_wallets
            .iter()
            .map(|w| w.wallet_index() + 1)
            .max()
            .unwrap_or(0)
    }

    fn insert(
        &mut self,
        public_spend_key: PublicKey,
        private_spend_key: Option<PrivateKey>,
        scan_height: u64,
        scan_timestamp: u64,
        config: &Config,
    ) -> Result<String, WalletError> {
        if self.contains(&public_spend_key) {
            return Err(WalletError::SubWalletAlreadyExists);
        }

        let address = encode_address(
            &public_spend_key,
            &self.public_view_key,
            None,
            config.address_prefix,
        );
        let wallet_index = self.next_wallet_index();
        self.sub_wallets.push(SubWallet::new(
            public_spend_key,
            private_spend_key,
            address.clone(),
            scan_height,
            scan_timestamp,
            false,
            wallet_index,
        ));
        Ok(address)
    }

    /// Adds a subwallet with a fresh random spend key.
    pub fn add_sub_wallet(
        &mut self,
        scan_height: u64,
        scan_timestamp: u64,
        config: &Config,
    ) -> Result<String, WalletError> {
        if self.is_view_wallet {
            return Err(WalletError::IllegalViewWalletOperation);
        }
        let spend = generate_keys();
        self.insert(
            spend.public_key,
            Some(spend.private_key),
            scan_height,
            scan_timestamp,
            config,
        )
    }

    pub fn import_sub_wallet(
        &mut self,
        private_spend_key: &PrivateKey,
        scan_height: u64,
        scan_timestamp: u64,
        config: &Config,
    ) -> Result<String, WalletError> {
        if self.is_view_wallet {
            return Err(WalletError::IllegalViewWalletOperation);
        }
        let public_spend_key = secret_key_to_public_key(private_spend_key)?;
        self.insert(
            public_spend_key,
            Some(*private_spend_key),
            scan_height,
            scan_timestamp,
            config,
        )
    }

    pub fn import_view_sub_wallet(
        &mut self,
        public_spend_key: &PublicKey,
        scan_height: u64,
        scan_timestamp: u64,
        config: &Config,
    ) -> Result<String, WalletError> {
        if !self.is_view_wallet {
            return Err(WalletError::IllegalNonViewWalletOperation);
        }
        if !crate::primitives::check_key(public_spend_key) {
            return Err(WalletError::InvalidKeyFormat(
                "public spend key is not a valid point".to_string(),
            ));
        }
        self.insert(*public_spend_key, None, scan_height, scan_timestamp, config)
    }

    /// Removes a subwallet along with its share of every transaction.
    pub fn delete_sub_wallet(&mut self, address: &str, config: &Config) -> Result<(), WalletError> {
        let sub_wallet = self.find_by_address(address, config)?;
        if sub_wallet.is_primary_address() {
            return Err(WalletError::CannotDeletePrimaryAddress);
        }
        let public_spend_key = *sub_wallet.public_spend_key();

        self.sub_wallets
            .retain(|w| w.public_spend_key() != &public_spend_key);
        for tx in &mut self.transactions {
            tx.transfers.retain(|t| t.public_key != public_spend_key);
        }
        self.transactions.retain(|tx| !tx.transfers.is_empty());
        Ok(())
    }

    pub fn set_label(
        &mut self,
        address: &str,
        label: Option<String>,
        config: &Config,
    ) -> Result<(), WalletError> {
        let public_spend_key = *self.find_by_address(address, config)?.public_spend_key();
        if let Some(sub_wallet) = self.get_mut(&public_spend_key) {
            sub_wallet.set_label(label);
        }
        Ok(())
    }

    pub fn private_spend_key(&self, public_spend_key: &PublicKey) -> Option<&PrivateKey> {
        self.get(public_spend_key)?.private_spend_key()
    }

    /// Lowest scan height of any subwallet.
    pub fn min_sync_start_height(&self) -> u64 {
        self.sub_wallets
            .iter()
            .map(|w| w.sync_start_height())
            .min()
            .unwrap_or(0)
    }

    // ========================================================================
    // INPUTS AND TRANSACTIONS
    // ========================================================================

    pub fn store_input(&mut self, public_spend_key: &PublicKey, input: TransactionInput) -> bool {
        self.get_mut(public_spend_key)
            .map(|w| w.store_input(input))
            .unwrap_or(false)
    }

    /// Marks the input with `key_image` spent in whichever subwallet owns it.
    /// Returns the owner and the input's amount.
    pub fn mark_input_as_spent(
        &mut self,
        key_image: &KeyImage,
        spend_height: u64,
    ) -> Option<(PublicKey, u64)> {
        self.sub_wallets.iter_mut().find_map(|w| {
            w.mark_input_as_spent(key_image, spend_height)
                .map(|amount| (*w.public_spend_key(), amount))
        })
    }

    /// Replaces any stored transaction with the same hash.
    pub fn store_transaction(&mut self, tx: Transaction) {
        match self.transactions.iter_mut().find(|t| t.hash == tx.hash) {
            Some(existing) => *existing = tx,
            None => self.transactions.push(tx),
        }
    }

    /// Oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.transactions.iter().find(|t| &t.hash == hash)
    }

    /// (unlocked, locked) over the given subwallets, or all of them.
    pub fn balance(&self, public_spend_keys: Option<&[PublicKey]>, current_height: u64) -> (u64, u64) {
        self.sub_wallets
            .iter()
            .filter(|w| public_spend_keys.map_or(true, |keys| keys.contains(w.public_spend_key())))
            .map(|w| w.balance(current_height))
            .fold((0u64, 0u64), |(unlocked, locked), (u, l)| {
                (unlocked.saturating_add(u), locked.saturating_add(l))
            })
    }

    pub fn rewind(&mut self, height: u64) {
        self.transactions.retain(|tx| tx.block_height <= height);
        for sub_wallet in &mut self.sub_wallets {
            sub_wallet.rewind(height);
        }
    }

    pub fn reset(&mut self, scan_height: u64, scan_timestamp: u64) {
        self.transactions.clear();
        for sub_wallet in &mut self.sub_wallets {
            sub_wallet.reset(scan_height, scan_timestamp);
        }
    }

    /// Checks that the loaded data is internally consistent.
    pub(crate) fn validate(&self, config: &Config) -> Result<(), WalletError> {
        if self.sub_wallets.iter().filter(|w| w.is_primary_address()).count() != 1 {
            return Err(WalletError::ParseFailure(
                "wallet must have exactly one primary address".to_string(),
            ));
        }

        for sub_wallet in &self.sub_wallets {
            match (sub_wallet.private_spend_key(), self.is_view_wallet) {
                (Some(private), false) => {
                    if &secret_key_to_public_key(private)? != sub_wallet.public_spend_key() {
                        return Err(WalletError::ParseFailure(format!(
                            "private spend key does not match public key for {}",
                            sub_wallet.address()
                        )));
                    }
                }
                (None, true) => {}
                _ => {
                    return Err(WalletError::ParseFailure(
                        "private spend key presence does not match wallet type".to_string(),
                    ))
                }
            }

            let expected = encode_address(
                sub_wallet.public_spend_key(),
                &self.public_view_key,
                None,
                config.address_prefix,
            );
            if expected != sub_wallet.address() {
                return Err(WalletError::ParseFailure(format!(
                    "address {} does not match its keys",
                    sub_wallet.address()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SERIALIZATION
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubWalletsRef<'a> {
    #[serde(with = "hex_vec")]
    public_spend_keys: Vec<PublicKey>,
    sub_wallet: &'a [SubWallet],
    transactions: &'a [Transaction],
    #[serde(with = "hex::serde")]
    private_view_key: &'a PrivateKey,
    is_view_wallet: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubWalletsRecord {
    #[serde(with = "hex_vec")]
    public_spend_keys: Vec<PublicKey>,
    sub_wallet: Vec<SubWallet>,
    #[serde(default)]
    transactions: Vec<Transaction>,
    #[serde(with = "hex::serde")]
    private_view_key: PrivateKey,
    is_view_wallet: bool,
}

impl std::fmt::Debug for SubWallets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubWallets")
            .field("sub_wallets", &self.sub_wallets)
            .field("transactions", &self.transactions.len())
            .field("private_view_key", &"<redacted>")
            .field("public_view_key", &hex::encode(self.public_view_key))
            .field("is_view_wallet", &self.is_view_wallet)
            .finish()
    }
}

impl Serialize for SubWallets {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SubWalletsRef {
            public_spend_keys: self.public_spend_keys(),
            sub_wallet: &self.sub_wallets,
            transactions: &self.transactions,
            private_view_key: &self.private_view_key,
            is_view_wallet: self.is_view_wallet,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SubWallets {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let record = SubWalletsRecord::deserialize(deserializer)?;
        let private_view_key = Zeroizing::new(record.private_view_key);

        let listed: Vec<PublicKey> = record
            .sub_wallet
            .iter()
            .map(|w| *w.public_spend_key())
            .collect();
        if listed != record.public_spend_keys {
            return Err(D::Error::custom(
                "publicSpendKeys does not match the subwallet list",
            ));
        }

        let public_view_key = secret_key_to_public_key(&private_view_key)
            .map_err(|e| D::Error::custom(e.to_string()))?;

        let mut sub_wallets = record.sub_wallet;
        sub_wallets.sort_by_key(|w| !w.is_primary_address());

        Ok(Self {
            sub_wallets,
            transactions: record.transactions,
            private_view_key,
            public_view_key,
            is_view_wallet: record.is_view_wallet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::key_from_hex;

    fn wallet() -> SubWallets {
        let spend = key_from_hex("a930cd8190bae670fc22d0e880f5d919da1e3d6da274a3c923049af1d2763901").unwrap();
        let keys = WalletKeys::from_private_spend_key(&spend).unwrap();
        SubWallets::new(&keys, 0, 0, &Config::default())
    }

    #[test]
    fn test_import_twice_fails() {
        let config = Config::default();
        let mut wallets = wallet();
        let key = generate_keys().private_key;

        wallets.import_sub_wallet(&key, 0, 0, &config).unwrap();
        assert_eq!(wallets.count(), 2);

        let result = wallets.import_sub_wallet(&key, 0, 0, &config);
        assert!(matches!(result, Err(WalletError::SubWalletAlreadyExists)));
        assert_eq!(wallets.count(), 2);
    }

    #[test]
    fn test_primary_cannot_be_deleted() {
        let config = Config::default();
        let mut wallets = wallet();
        let primary = wallets.primary().unwrap().address().to_string();

        let result = wallets.delete_sub_wallet(&primary, &config);
        assert!(matches!(result, Err(WalletError::CannotDeletePrimaryAddress)));

        let added = wallets.add_sub_wallet(0, 0, &config).unwrap();
        wallets.delete_sub_wallet(&added, &config).unwrap();
        assert_eq!(wallets.count(), 1);
    }

    #[test]
    fn test_view_only_operations() {
        let config = Config::default();
        let mut wallets = wallet();
        let result = wallets.import_view_sub_wallet(&[0u8; 32], 0, 0, &config);
        assert!(matches!(result, Err(WalletError::IllegalNonViewWalletOperation)));
    }

    #[test]
    fn test_foreign_address_not_in_wallet() {
        let config = Config::default();
        let wallets = wallet();
        let foreign = "NaCar2zUqGFSGYPYzagBJEN9Tovgx8fv2dhZ5tXSGw4WAyE5TsP44JaaEkPX9zNR86bnBH7M1RJYjCC6zdFTn8Lg1atLMVHSWm";
        assert!(matches!(
            wallets.find_by_address(foreign, &config),
            Err(WalletError::AddressNotInWallet)
        ));
    }

    #[test]
    fn test_json_keeps_order() {
        let config = Config::default();
        let mut wallets = wallet();
        wallets.add_sub_wallet(0, 0, &config).unwrap();
        wallets.add_sub_wallet(0, 0, &config).unwrap();

        let json = serde_json::to_string(&wallets).unwrap();
        let restored: SubWallets = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.addresses(), wallets.addresses());
        assert_eq!(serde_json::to_string(&restored).unwrap(), json);
        restored.validate(&config).unwrap();
    }
}

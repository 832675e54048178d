//! Wallet key derivation: seed, spend key pair and view key pair.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::mnemonic::{mnemonic_to_private_key, private_key_to_mnemonic};
use crate::primitives::{
    cn_fast_hash, generate_keys, is_canonical_scalar, key_pair_from_bytes, sc_reduce32,
    secret_key_to_public_key, KeyPair, PrivateKey,
};
use crate::WalletError;

/// The spend and view key pairs of a wallet's primary address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletKeys {
    pub spend: KeyPair,
    pub view: KeyPair,
}

/// Derives the private view key that belongs to a deterministic wallet.
pub fn private_spend_key_to_private_view_key(private_spend_key: &PrivateKey) -> PrivateKey {
    sc_reduce32(&cn_fast_hash(private_spend_key))
}

/// True when the view key was derived from the spend key, i.e. a seed exists.
pub fn is_deterministic(private_spend_key: &PrivateKey, private_view_key: &PrivateKey) -> bool {
    let derived = Zeroizing::new(private_spend_key_to_private_view_key(private_spend_key));
    derived[..].ct_eq(&private_view_key[..]).into()
}

fn key_pair(private_key: &PrivateKey) -> Result<KeyPair, WalletError> {
    Ok(KeyPair {
        public_key: secret_key_to_public_key(private_key)?,
        private_key: *private_key,
    })
}

impl WalletKeys {
    /// Fresh deterministic keys.
    pub fn generate() -> Self {
        let spend = generate_keys();
        let view = key_pair_from_bytes(&cn_fast_hash(&spend.private_key));
        Self { spend, view }
    }

    pub fn from_mnemonic(mnemonic: &str) -> Result<Self, WalletError> {
        let private_spend_key = mnemonic_to_private_key(mnemonic)?;
        Self::from_private_spend_key(&private_spend_key)
    }

    /// Deterministic keys from a private spend key alone.
    pub fn from_private_spend_key(private_spend_key: &PrivateKey) -> Result<Self, WalletError> {
        let view_private = private_spend_key_to_private_view_key(private_spend_key);
        Self::from_private_keys(private_spend_key, &view_private)
    }

    /// Keys as given. The pair need not be deterministic.
    pub fn from_private_keys(
        private_spend_key: &PrivateKey,
        private_view_key: &PrivateKey,
    ) -> Result<Self, WalletError> {
        if !is_canonical_scalar(private_spend_key) {
            return Err(WalletError::InvalidKeyFormat(
                "private spend key is not a reduced scalar".to_string(),
            ));
        }
        if !is_canonical_scalar(private_view_key) {
            return Err(WalletError::InvalidKeyFormat(
                "private view key is not a reduced scalar".to_string(),
            ));
        }

        Ok(Self {
            spend: key_pair(private_spend_key)?,
            view: key_pair(private_view_key)?,
        })
    }

    pub fn is_deterministic(&self) -> bool {
        is_deterministic(&self.spend.private_key, &self.view.private_key)
    }

    /// # Errors
    ///
    /// `KeysNotDeterministic` when the view key is not derived from the spend key.
    pub fn to_mnemonic(&self) -> Result<String, WalletError> {
        if !self.is_deterministic() {
            return Err(WalletError::KeysNotDeterministic);
        }
        Ok(private_key_to_mnemonic(&self.spend.private_key))
    }
}

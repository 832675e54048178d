//! A single spend key pair and the outputs it owns.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::primitives::{Hash, KeyImage, PrivateKey, PublicKey};
use crate::types::{private_key_or_zero, TransactionInput};
use crate::utils::is_input_unlocked;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWallet {
    #[serde(with = "hex::serde")]
    public_spend_key: PublicKey,
    /// None on view wallets.
    #[serde(with = "private_key_or_zero")]
    private_spend_key: Option<PrivateKey>,
    address: String,
    sync_start_timestamp: u64,
    unspent_inputs: Vec<TransactionInput>,
    spent_inputs: Vec<TransactionInput>,
    sync_start_height: u64,
    is_primary_address: bool,
    wallet_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl std::fmt::Debug for SubWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubWallet")
            .field("address", &self.address)
            .field("private_spend_key", &self.private_spend_key.as_ref().map(|_| "<redacted>"))
            .field("unspent_inputs", &self.unspent_inputs.len())
            .field("spent_inputs", &self.spent_inputs.len())
            .field("sync_start_height", &self.sync_start_height)
            .field("is_primary_address", &self.is_primary_address)
            .field("wallet_index", &self.wallet_index)
            .field("label", &self.label)
            .finish()
    }
}

impl Drop for SubWallet {
    fn drop(&mut self) {
        if let Some(key) = self.private_spend_key.as_mut() {
            key.zeroize();
        }
    }
}

impl SubWallet {
    pub fn new(
        public_spend_key: PublicKey,
        private_spend_key: Option<PrivateKey>,
        address: String,
        scan_height: u64,
        scan_timestamp: u64,
        is_primary_address: bool,
        wallet_index: u64,
    ) -> Self {
        Self {
            public_spend_key,
            private_spend_key,
            address,
            sync_start_timestamp: scan_timestamp,
            unspent_inputs: Vec::new(),
            spent_inputs: Vec::new(),
            sync_start_height: scan_height,
            is_primary_address,
            wallet_index,
            label: None,
        }
    }

    pub fn public_spend_key(&self) -> &PublicKey {
        &self.public_spend_key
    }

    pub fn private_spend_key(&self) -> Option<&PrivateKey> {
        self.private_spend_key.as_ref()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_primary_address(&self) -> bool {
        self.is_primary_address
    }

    pub fn wallet_index(&self) -> u64 {
        self.wallet_index
    }

    pub fn sync_start_height(&self) -> u64 {
        self.sync_start_height
    }

    pub fn sync_start_timestamp(&self) -> u64 {
        self.sync_start_timestamp
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn unspent_inputs(&self) -> &[TransactionInput] {
        &self.unspent_inputs
    }

    pub fn spent_inputs(&self) -> &[TransactionInput] {
        &self.spent_inputs
    }

    fn owns_output(&self, output_id: &(Hash, u64)) -> bool {
        self.unspent_inputs
            .iter()
            .chain(self.spent_inputs.iter())
            .any(|input| &input.output_id() == output_id)
    }

    /// Records a received output. Returns false if it was already known.
    pub fn store_input(&mut self, input: TransactionInput) -> bool {
        if self.owns_output(&input.output_id()) {
            return false;
        }
        self.unspent_inputs.push(input);
        true
    }

    /// Moves the unspent input with `key_image` to the spent list and returns its amount.
    pub fn mark_input_as_spent(&mut self, key_image: &KeyImage, spend_height: u64) -> Option<u64> {
        let position = self
            .unspent_inputs
            .iter()
            .position(|input| input.key_image.as_ref() == Some(key_image))?;

        let mut input = self.unspent_inputs.remove(position);
        input.spend_height = spend_height;
        let amount = input.amount;
        self.spent_inputs.push(input);
        Some(amount)
    }

    /// Forgets everything above `height`. Inputs received at or below it but
    /// spent above it become unspent again.
    pub fn rewind(&mut self, height: u64) {
        self.unspent_inputs.retain(|input| input.block_height <= height);
        self.spent_inputs.retain(|input| input.block_height <= height);

        let (unspent_again, still_spent): (Vec<_>, Vec<_>) = self
            .spent_inputs
            .drain(..)
            .partition(|input| input.spend_height > height);
        self.spent_inputs = still_spent;
        self.unspent_inputs.extend(unspent_again.into_iter().map(|mut input| {
            input.spend_height = 0;
            input
        }));
        self.unspent_inputs.sort_by_key(|input| input.block_height);
    }

    pub fn reset(&mut self, scan_height: u64, scan_timestamp: u64) {
        self.unspent_inputs.clear();
        self.spent_inputs.clear();
        self.sync_start_height = scan_height;
        self.sync_start_timestamp = scan_timestamp;
    }

    /// (unlocked, locked) at `current_height`.
    pub fn balance(&self, current_height: u64) -> (u64, u64) {
        self.unspent_inputs
            .iter()
            .fold((0u64, 0u64), |(unlocked, locked), input| {
                if is_input_unlocked(input.unlock_time, current_height) {
                    (unlocked.saturating_add(input.amount), locked)
                } else {
                    (unlocked, locked.saturating_add(input.amount))
                }
            })
    }
}

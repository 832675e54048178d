//! Block scanning: matches chain outputs and key images to the wallet's keys.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::primitives::{
    derive_secret_key, generate_key_derivation, generate_key_image, underive_public_key, Hash,
    KeyDerivation, PrivateKey,
};
use crate::subwallets::SubWallets;
use crate::types::{hex_vec, Block, RawTransaction, Transaction, TransactionInput};

/// Where scanning is, as persisted with the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationStatus {
    /// Hashes at every `block_hash_checkpoint_interval` heights, newest first.
    #[serde(with = "hex_vec")]
    block_hash_checkpoints: Vec<Hash>,
    /// Hashes of the most recent blocks, newest first.
    #[serde(with = "hex_vec")]
    last_known_block_hashes: Vec<Hash>,
    last_known_block_height: u64,
}

impl SynchronizationStatus {
    pub fn last_known_block_height(&self) -> u64 {
        self.last_known_block_height
    }

    pub fn last_known_block_hashes(&self) -> &[Hash] {
        &self.last_known_block_hashes
    }

    pub fn block_hash_checkpoints(&self) -> &[Hash] {
        &self.block_hash_checkpoints
    }

    fn has_progress(&self) -> bool {
        self.last_known_block_height != 0 || !self.last_known_block_hashes.is_empty()
    }

    fn store_block_hash(&mut self, height: u64, hash: Hash, config: &Config) {
        self.last_known_block_height = height;
        self.last_known_block_hashes.insert(0, hash);
        self.last_known_block_hashes
            .truncate(config.max_last_known_block_hashes);

        if config.block_hash_checkpoint_interval > 0 && height % config.block_hash_checkpoint_interval == 0 {
            self.block_hash_checkpoints.insert(0, hash);
        }
    }

    fn rewind(&mut self, height: u64, config: &Config) {
        if height >= self.last_known_block_height {
            return;
        }

        let dropped = self.last_known_block_height - height;
        let dropped = usize::try_from(dropped).unwrap_or(usize::MAX);
        self.last_known_block_hashes
            .drain(..dropped.min(self.last_known_block_hashes.len()));

        if config.block_hash_checkpoint_interval > 0 {
            let interval = config.block_hash_checkpoint_interval;
            let stale = self.last_known_block_height / interval - height / interval;
            let stale = usize::try_from(stale).unwrap_or(usize::MAX);
            self.block_hash_checkpoints
                .drain(..stale.min(self.block_hash_checkpoints.len()));
        }

        self.last_known_block_height = height;
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSynchronizer {
    start_timestamp: u64,
    start_height: u64,
    #[serde(with = "hex::serde")]
    private_view_key: PrivateKey,
    #[serde(rename = "transactionSynchronizerStatus")]
    status: SynchronizationStatus,
}

impl WalletSynchronizer {
    pub fn new(start_height: u64, start_timestamp: u64, private_view_key: PrivateKey) -> Self {
        Self {
            start_timestamp,
            start_height,
            private_view_key,
            status: SynchronizationStatus::default(),
        }
    }

    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    pub fn private_view_key(&self) -> &PrivateKey {
        &self.private_view_key
    }

    pub fn status(&self) -> &SynchronizationStatus {
        &self.status
    }

    /// Height of the last block processed, 0 before any.
    pub fn height(&self) -> u64 {
        self.status.last_known_block_height
    }

    /// First height not yet processed.
    pub fn next_height(&self) -> u64 {
        if self.status.has_progress() {
            (self.status.last_known_block_height + 1).max(self.start_height)
        } else {
            self.start_height
        }
    }

    /// Processes `blocks` in order, applying every owned output and spend to
    /// `sub_wallets` as it goes. Returns the transactions that touched the wallet.
    ///
    /// Blocks below [`Self::next_height`] were already processed and are skipped.
    pub fn process_blocks(
        &mut self,
        blocks: &[Block],
        sub_wallets: &mut SubWallets,
        config: &Config,
    ) -> Vec<Transaction> {
        let mut found = Vec::new();

        for block in blocks {
            if block.block_height < self.next_height() {
                trace!(height = block.block_height, "skipping processed block");
                continue;
            }

            let scan = block.block_height >= self.start_height
                && block.block_timestamp >= self.start_timestamp;

            if scan {
                let coinbase = block
                    .coinbase_transaction
                    .iter()
                    .filter(|_| config.scan_coinbase_transactions)
                    .map(|tx| (tx, true));
                let regular = block.transactions.iter().map(|tx| (tx, false));

                for (raw, is_coinbase) in coinbase.chain(regular) {
                    if !amounts_in_range(raw) {
                        warn!(
                            height = block.block_height,
                            hash = %hex::encode(raw.hash),
                            "skipping transaction with out of range amounts"
                        );
                        continue;
                    }
                    if let Some(tx) = self.process_transaction(raw, is_coinbase, block, sub_wallets) {
                        debug!(
                            height = block.block_height,
                            hash = %hex::encode(tx.hash),
                            amount = tx.total_amount(),
                            "found transaction"
                        );
                        sub_wallets.store_transaction(tx.clone());
                        found.push(tx);
                    }
                }
            }

            self.status
                .store_block_hash(block.block_height, block.block_hash, config);
        }

        found
    }

    fn process_transaction(
        &self,
        raw: &RawTransaction,
        is_coinbase: bool,
        block: &Block,
        sub_wallets: &mut SubWallets,
    ) -> Option<Transaction> {
        let mut tx = Transaction {
            transfers: Vec::new(),
            hash: raw.hash,
            fee: 0,
            block_height: block.block_height,
            timestamp: block.block_timestamp,
            payment_id: raw.payment_id.clone(),
            unlock_time: raw.unlock_time,
            is_coinbase_transaction: is_coinbase,
        };

        // An invalid transaction key only rules out outputs; the inputs can still be ours.
        if let Ok(derivation) = generate_key_derivation(&raw.transaction_public_key, &self.private_view_key) {
            let derivation = Zeroizing::new(derivation);
            self.process_outputs(raw, &derivation, block, sub_wallets, &mut tx);
        }

        for input in &raw.key_inputs {
            if let Some((owner, amount)) = sub_wallets.mark_input_as_spent(&input.key_image, block.block_height) {
                tx.credit(&owner, -i64::try_from(amount).unwrap_or(i64::MAX));
            }
        }

        if tx.transfers.is_empty() {
            return None;
        }

        if !is_coinbase {
            let inputs = checked_total(raw.key_inputs.iter().map(|i| i.amount)).unwrap_or(u64::MAX);
            let outputs = checked_total(raw.key_outputs.iter().map(|o| o.amount)).unwrap_or(u64::MAX);
            tx.fee = inputs.saturating_sub(outputs);
        }

        Some(tx)
    }

    fn process_outputs(
        &self,
        raw: &RawTransaction,
        derivation: &KeyDerivation,
        block: &Block,
        sub_wallets: &mut SubWallets,
        tx: &mut Transaction,
    ) {
        for (index, output) in raw.key_outputs.iter().enumerate() {
            let index = index as u64;
            let Ok(spend_key) = underive_public_key(derivation, index, &output.key) else {
                continue;
            };
            if !sub_wallets.contains(&spend_key) {
                continue;
            }

            let key_image = sub_wallets.private_spend_key(&spend_key).and_then(|private_spend_key| {
                let secret = derive_secret_key(derivation, index, private_spend_key).ok()?;
                generate_key_image(&output.key, &secret).ok()
            });

            let input = TransactionInput {
                key_image,
                amount: output.amount,
                block_height: block.block_height,
                transaction_public_key: raw.transaction_public_key,
                transaction_index: index,
                global_output_index: output.global_index,
                key: output.key,
                spend_height: 0,
                unlock_time: raw.unlock_time,
                parent_transaction_hash: raw.hash,
            };

            if sub_wallets.store_input(&spend_key, input) {
                tx.credit(&spend_key, i64::try_from(output.amount).unwrap_or(i64::MAX));
            }
        }
    }

    /// Moves the cursor back to `height`. Never moves it forward.
    pub fn rewind(&mut self, height: u64, config: &Config) {
        self.status.rewind(height, config);
    }

    /// Rewinds so blocks from `height` onwards are scanned again, lowering the
    /// start height if needed. Used when keys with an older birth are imported.
    ///
    /// The start timestamp is always cleared: it only describes the keys the
    /// wallet was created with, and would hide older blocks from the new ones.
    pub fn rescan_from(&mut self, height: u64, config: &Config) {
        self.status.rewind(height.saturating_sub(1), config);
        self.start_height = self.start_height.min(height);
        self.start_timestamp = 0;
    }

    /// Forgets all progress and starts again from the given point.
    pub fn reset(&mut self, start_height: u64, start_timestamp: u64) {
        self.start_height = start_height;
        self.start_timestamp = start_timestamp;
        self.status = SynchronizationStatus::default();
    }
}

fn checked_total(mut amounts: impl Iterator<Item = u64>) -> Option<u64> {
    amounts.try_fold(0u64, u64::checked_add)
}

/// Whether the input and output totals each fit a signed amount. Transfers are
/// signed, so anything larger cannot be recorded and the transaction is dropped
/// before it touches any wallet.
fn amounts_in_range(raw: &RawTransaction) -> bool {
    let max = i64::MAX as u64;
    let fits = |total: Option<u64>| total.is_some_and(|total| total <= max);

    fits(checked_total(raw.key_inputs.iter().map(|i| i.amount)))
        && fits(checked_total(raw.key_outputs.iter().map(|o| o.amount)))
}

impl std::fmt::Debug for WalletSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSynchronizer")
            .field("start_timestamp", &self.start_timestamp)
            .field("start_height", &self.start_height)
            .field("private_view_key", &"<redacted>")
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64) -> Block {
        Block {
            block_hash: [height as u8; 32],
            block_height: height,
            block_timestamp: 1000 + height,
            coinbase_transaction: None,
            transactions: Vec::new(),
        }
    }

    fn sub_wallets() -> SubWallets {
        let keys = crate::keys::WalletKeys::generate();
        SubWallets::new(&keys, 0, 0, &Config::default())
    }

    #[test]
    fn test_cursor_advances_and_skips_processed() {
        let config = Config::default();
        let mut wallets = sub_wallets();
        let mut sync = WalletSynchronizer::new(5, 0, *wallets.private_view_key());

        assert_eq!(sync.next_height(), 5);
        sync.process_blocks(&[block(5), block(6)], &mut wallets, &config);
        assert_eq!(sync.height(), 6);
        assert_eq!(sync.next_height(), 7);

        sync.process_blocks(&[block(6), block(7)], &mut wallets, &config);
        assert_eq!(sync.height(), 7);
        assert_eq!(sync.status().last_known_block_hashes()[0], [7u8; 32]);
        assert_eq!(sync.status().last_known_block_hashes().len(), 3);
    }

    #[test]
    fn test_rewind_never_advances() {
        let config = Config::default();
        let mut wallets = sub_wallets();
        let mut sync = WalletSynchronizer::new(0, 0, *wallets.private_view_key());
        sync.process_blocks(&[block(1), block(2), block(3)], &mut wallets, &config);

        sync.rewind(10, &config);
        assert_eq!(sync.height(), 3);

        sync.rewind(1, &config);
        assert_eq!(sync.height(), 1);
        assert_eq!(sync.status().last_known_block_hashes(), &[[1u8; 32]]);
        assert_eq!(sync.next_height(), 2);
    }

    #[test]
    fn test_hash_history_is_capped() {
        let mut config = Config::default();
        config.max_last_known_block_hashes = 3;
        config.block_hash_checkpoint_interval = 2;

        let mut wallets = sub_wallets();
        let mut sync = WalletSynchronizer::new(0, 0, *wallets.private_view_key());
        let blocks: Vec<Block> = (1..=6).map(block).collect();
        sync.process_blocks(&blocks, &mut wallets, &config);

        assert_eq!(sync.status().last_known_block_hashes(), &[[6u8; 32], [5u8; 32], [4u8; 32]]);
        assert_eq!(sync.status().block_hash_checkpoints(), &[[6u8; 32], [4u8; 32], [2u8; 32]]);

        sync.rewind(3, &config);
        assert!(sync.status().last_known_block_hashes().is_empty());
        assert_eq!(sync.status().block_hash_checkpoints(), &[[2u8; 32]]);
    }

    #[test]
    fn test_rescan_lowers_start() {
        let config = Config::default();
        let mut wallets = sub_wallets();
        let mut sync = WalletSynchronizer::new(100, 5000, *wallets.private_view_key());
        sync.process_blocks(&[block(100), block(101)], &mut wallets, &config);

        sync.rescan_from(50, &config);
        assert_eq!(sync.start_height(), 50);
        assert_eq!(sync.start_timestamp(), 0);
        assert_eq!(sync.next_height(), 50);
    }

    #[test]
    fn test_rescan_clears_start_timestamp() {
        let config = Config::default();
        let mut wallets = sub_wallets();
        let mut sync = WalletSynchronizer::new(0, 5000, *wallets.private_view_key());
        sync.process_blocks(&[block(1), block(2), block(3)], &mut wallets, &config);

        sync.rescan_from(2, &config);
        assert_eq!(sync.start_height(), 0);
        assert_eq!(sync.start_timestamp(), 0);
        assert_eq!(sync.next_height(), 2);
    }

    fn raw(inputs: &[u64], outputs: &[u64]) -> RawTransaction {
        RawTransaction {
            key_outputs: outputs
                .iter()
                .map(|&amount| crate::types::KeyOutput {
                    key: [7u8; 32],
                    amount,
                    global_index: None,
                })
                .collect(),
            hash: [3u8; 32],
            transaction_public_key: [0u8; 32],
            unlock_time: 0,
            payment_id: None,
            key_inputs: inputs
                .iter()
                .map(|&amount| crate::types::KeyInput {
                    amount,
                    key_image: [4u8; 32],
                    output_indexes: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_amounts_in_range() {
        assert!(amounts_in_range(&raw(&[100], &[60, 30])));
        assert!(amounts_in_range(&raw(&[], &[i64::MAX as u64])));
        assert!(!amounts_in_range(&raw(&[], &[i64::MAX as u64 + 1])));
        assert!(!amounts_in_range(&raw(&[], &[u64::MAX, 2])));
        assert!(!amounts_in_range(&raw(&[u64::MAX, 2], &[1])));
    }

    #[test]
    fn test_out_of_range_transaction_is_skipped() {
        let config = Config::default();
        let mut wallets = sub_wallets();
        let mut sync = WalletSynchronizer::new(0, 0, *wallets.private_view_key());

        let mut bad = block(1);
        bad.transactions.push(raw(&[u64::MAX, 2], &[u64::MAX, 2]));
        let found = sync.process_blocks(&[bad, block(2)], &mut wallets, &config);

        assert!(found.is_empty());
        assert_eq!(sync.height(), 2);
    }

    #[test]
    fn test_debug_hides_view_key() {
        let sync = WalletSynchronizer::new(0, 0, [0xab; 32]);
        let debug = format!("{sync:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("171, 171"));
    }
}

//! Wallet and chain types.

use serde::{Deserialize, Serialize};

use crate::primitives::{Hash, KeyImage, PublicKey};

/// An output received by one of the wallet's subwallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    /// None for view wallets, which cannot compute key images.
    #[serde(with = "hex_option")]
    pub key_image: Option<KeyImage>,
    pub amount: u64,
    pub block_height: u64,
    #[serde(with = "hex::serde")]
    pub transaction_public_key: PublicKey,
    /// Index of the output within its transaction.
    pub transaction_index: u64,
    pub global_output_index: Option<u64>,
    /// One-time output key.
    #[serde(with = "hex::serde")]
    pub key: PublicKey,
    /// Zero while unspent.
    pub spend_height: u64,
    pub unlock_time: u64,
    #[serde(with = "hex::serde")]
    pub parent_transaction_hash: Hash,
}

impl TransactionInput {
    pub fn is_spent(&self) -> bool {
        self.spend_height != 0
    }

    /// (transaction hash, output index), unique per output on chain.
    pub fn output_id(&self) -> (Hash, u64) {
        (self.parent_transaction_hash, self.transaction_index)
    }
}

/// Net amount a transaction moved for one subwallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Positive for incoming, negative for outgoing (atomic units)
    pub amount: i64,
    #[serde(with = "hex::serde")]
    pub public_key: PublicKey,
}

/// A transaction as observed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transfers: Vec<Transfer>,
    #[serde(with = "hex::serde")]
    pub hash: Hash,
    pub fee: u64,
    pub block_height: u64,
    pub timestamp: u64,
    #[serde(rename = "paymentID")]
    pub payment_id: Option<String>,
    pub unlock_time: u64,
    #[serde(rename = "isCoinbaseTransaction")]
    pub is_coinbase_transaction: bool,
}

impl Transaction {
    /// Sum over every subwallet.
    pub fn total_amount(&self) -> i64 {
        self.transfers
            .iter()
            .fold(0i64, |total, t| total.saturating_add(t.amount))
    }

    pub fn transfer_for(&self, public_spend_key: &PublicKey) -> Option<i64> {
        self.transfers
            .iter()
            .find(|t| &t.public_key == public_spend_key)
            .map(|t| t.amount)
    }

    /// Adds `amount` to the transfer for `public_spend_key`, creating it if needed.
    pub(crate) fn credit(&mut self, public_spend_key: &PublicKey, amount: i64) {
        match self.transfers.iter_mut().find(|t| &t.public_key == public_spend_key) {
            Some(transfer) => transfer.amount = transfer.amount.saturating_add(amount),
            None => self.transfers.push(Transfer {
                amount,
                public_key: *public_spend_key,
            }),
        }
    }
}

/// (wallet height, daemon local height, network height)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub wallet_block_count: u64,
    pub local_daemon_block_count: u64,
    pub network_block_count: u64,
}

// ============================================================================
// CHAIN DATA (as served by the daemon)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOutput {
    #[serde(with = "hex::serde")]
    pub key: PublicKey,
    pub amount: u64,
    #[serde(default)]
    pub global_index: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInput {
    pub amount: u64,
    #[serde(with = "hex::serde")]
    pub key_image: KeyImage,
    #[serde(default)]
    pub output_indexes: Vec<u64>,
}

/// A transaction reduced to what scanning needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub key_outputs: Vec<KeyOutput>,
    #[serde(with = "hex::serde")]
    pub hash: Hash,
    #[serde(with = "hex::serde")]
    pub transaction_public_key: PublicKey,
    pub unlock_time: u64,
    #[serde(rename = "paymentID", default)]
    pub payment_id: Option<String>,
    /// Empty for coinbase transactions.
    #[serde(default)]
    pub key_inputs: Vec<KeyInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(with = "hex::serde")]
    pub block_hash: Hash,
    pub block_height: u64,
    pub block_timestamp: u64,
    #[serde(default)]
    pub coinbase_transaction: Option<RawTransaction>,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// `Option<[u8; 32]>` as a hex string or null.
pub(crate) mod hex_option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Deserialize::deserialize(deserializer)?;
        text.map(|text| {
            let mut bytes = [0u8; 32];
            hex::decode_to_slice(&text, &mut bytes).map_err(serde::de::Error::custom)?;
            Ok(bytes)
        })
        .transpose()
    }
}

/// `Vec<[u8; 32]>` as a list of hex strings.
pub(crate) mod hex_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(values: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&hex::encode(value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let texts: Vec<String> = Deserialize::deserialize(deserializer)?;
        texts
            .iter()
            .map(|text| {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(text, &mut bytes).map_err(serde::de::Error::custom)?;
                Ok(bytes)
            })
            .collect()
    }
}

/// A private key that is absent on view wallets, stored as 64 zeros in that case.
pub(crate) mod private_key_or_zero {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value.unwrap_or([0u8; 32])))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&text, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok((bytes != [0u8; 32]).then_some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input(spend_height: u64) -> TransactionInput {
        TransactionInput {
            key_image: None,
            amount: 1234,
            block_height: 10,
            transaction_public_key: [1u8; 32],
            transaction_index: 0,
            global_output_index: Some(99),
            key: [2u8; 32],
            spend_height,
            unlock_time: 0,
            parent_transaction_hash: [3u8; 32],
        }
    }

    #[test]
    fn test_input_json_field_names() {
        let json = serde_json::to_value(sample_input(0)).unwrap();
        assert_eq!(json["keyImage"], serde_json::Value::Null);
        assert_eq!(json["globalOutputIndex"], 99);
        assert_eq!(json["parentTransactionHash"], hex::encode([3u8; 32]));
    }

    #[test]
    fn test_spent_flag() {
        assert!(!sample_input(0).is_spent());
        assert!(sample_input(11).is_spent());
    }

    #[test]
    fn test_transaction_credit_merges_transfers() {
        let mut tx = Transaction {
            transfers: Vec::new(),
            hash: [0u8; 32],
            fee: 10,
            block_height: 5,
            timestamp: 1_600_000_000,
            payment_id: None,
            unlock_time: 0,
            is_coinbase_transaction: false,
        };
        tx.credit(&[7u8; 32], 500);
        tx.credit(&[7u8; 32], -200);
        tx.credit(&[8u8; 32], 50);

        assert_eq!(tx.transfers.len(), 2);
        assert_eq!(tx.transfer_for(&[7u8; 32]), Some(300));
        assert_eq!(tx.total_amount(), 350);

        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("paymentID").is_some());
        assert_eq!(json["isCoinbaseTransaction"], false);
    }

    #[test]
    fn test_block_deserializes_with_defaults() {
        let json = format!(
            r#"{{"blockHash":"{}","blockHeight":7,"blockTimestamp":1000}}"#,
            hex::encode([9u8; 32])
        );
        let block: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block.block_height, 7);
        assert!(block.coinbase_transaction.is_none());
        assert!(block.transactions.is_empty());
    }
}

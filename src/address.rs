//! Standard and integrated address encoding.
//!
//! `base58(varint(prefix) || [payment id] || spend key || view key || checksum)`,
//! where the checksum is the first 4 bytes of the Keccak hash of everything before it
//! and the payment id, when present, is its 64 hex characters as ASCII.

use crate::config::Config;
use crate::primitives::{check_key, cn_fast_hash, read_varint, write_varint, PublicKey};
use crate::WalletError;

const CHECKSUM_SIZE: usize = 4;
const KEY_SIZE: usize = 32;
pub const PAYMENT_ID_LENGTH: usize = 64;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;
const ENCODED_BLOCK_SIZES: [usize; 9] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub prefix: u64,
    pub public_spend_key: PublicKey,
    pub public_view_key: PublicKey,
    pub payment_id: Option<String>,
}

impl DecodedAddress {
    pub fn is_integrated(&self) -> bool {
        self.payment_id.is_some()
    }
}

fn encoded_length(raw_length: usize) -> usize {
    (raw_length / FULL_BLOCK_SIZE) * FULL_ENCODED_BLOCK_SIZE
        + ENCODED_BLOCK_SIZES[raw_length % FULL_BLOCK_SIZE]
}

fn prefix_length(prefix: u64) -> usize {
    let mut buf = Vec::with_capacity(10);
    write_varint(&mut buf, prefix);
    buf.len()
}

/// Length of a standard address under `prefix`.
pub fn standard_address_length(prefix: u64) -> usize {
    encoded_length(prefix_length(prefix) + 2 * KEY_SIZE + CHECKSUM_SIZE)
}

/// Length of an integrated address under `prefix`.
pub fn integrated_address_length(prefix: u64) -> usize {
    encoded_length(prefix_length(prefix) + PAYMENT_ID_LENGTH + 2 * KEY_SIZE + CHECKSUM_SIZE)
}

pub fn encode_address(
    public_spend_key: &PublicKey,
    public_view_key: &PublicKey,
    payment_id: Option<&str>,
    prefix: u64,
) -> String {
    let mut raw = Vec::with_capacity(10 + PAYMENT_ID_LENGTH + 2 * KEY_SIZE + CHECKSUM_SIZE);
    write_varint(&mut raw, prefix);
    if let Some(payment_id) = payment_id {
        raw.extend_from_slice(payment_id.as_bytes());
    }
    raw.extend_from_slice(public_spend_key);
    raw.extend_from_slice(public_view_key);

    let checksum = cn_fast_hash(&raw);
    raw.extend_from_slice(&checksum[..CHECKSUM_SIZE]);

    // Fails only on an empty block, which `chunks` never yields.
    base58_monero::encode(&raw).unwrap_or_default()
}

/// Decodes any well-formed address, whatever its prefix.
pub fn decode_address(address: &str) -> Result<DecodedAddress, WalletError> {
    let raw = base58_monero::decode(address).map_err(|_| WalletError::AddressNotBase58)?;

    let (prefix, prefix_len) = read_varint(&raw).ok_or(WalletError::AddressNotValid)?;
    let body = &raw[prefix_len..];

    let payment_id_len = match body.len() {
        n if n == 2 * KEY_SIZE + CHECKSUM_SIZE => 0,
        n if n == PAYMENT_ID_LENGTH + 2 * KEY_SIZE + CHECKSUM_SIZE => PAYMENT_ID_LENGTH,
        _ => return Err(WalletError::AddressNotValid),
    };

    let (signed, checksum) = raw.split_at(raw.len() - CHECKSUM_SIZE);
    if cn_fast_hash(signed)[..CHECKSUM_SIZE] != *checksum {
        return Err(WalletError::AddressNotValid);
    }

    let payment_id = if payment_id_len > 0 {
        let text = std::str::from_utf8(&body[..payment_id_len])
            .map_err(|_| WalletError::AddressNotValid)?;
        if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(WalletError::AddressNotValid);
        }
        Some(text.to_string())
    } else {
        None
    };

    let keys = &body[payment_id_len..payment_id_len + 2 * KEY_SIZE];
    let mut public_spend_key = [0u8; KEY_SIZE];
    let mut public_view_key = [0u8; KEY_SIZE];
    public_spend_key.copy_from_slice(&keys[..KEY_SIZE]);
    public_view_key.copy_from_slice(&keys[KEY_SIZE..]);

    if !check_key(&public_spend_key) || !check_key(&public_view_key) {
        return Err(WalletError::AddressNotValid);
    }

    Ok(DecodedAddress {
        prefix,
        public_spend_key,
        public_view_key,
        payment_id,
    })
}

/// Validates one address against the wallet's currency.
///
/// Checks run in a fixed order so the first failure is reported: length,
/// alphabet, prefix, checksum and key validity, then integrated-ness.
pub fn validate_address(
    address: &str,
    integrated_allowed: bool,
    config: &Config,
) -> Result<DecodedAddress, WalletError> {
    let standard = standard_address_length(config.address_prefix);
    let integrated = integrated_address_length(config.address_prefix);

    if address.len() != standard && address.len() != integrated {
        return Err(WalletError::AddressWrongLength);
    }

    if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
        return Err(WalletError::AddressNotBase58);
    }

    let raw = base58_monero::decode(address).map_err(|_| WalletError::AddressNotValid)?;
    match read_varint(&raw) {
        Some((prefix, _)) if prefix == config.address_prefix => {}
        _ => return Err(WalletError::AddressWrongPrefix),
    }

    let decoded = decode_address(address).map_err(|_| WalletError::AddressNotValid)?;

    if decoded.is_integrated() && !integrated_allowed {
        return Err(WalletError::AddressIsIntegrated);
    }

    Ok(decoded)
}

/// Validates every address, failing on the first bad one.
pub fn validate_addresses<S: AsRef<str>>(
    addresses: &[S],
    integrated_allowed: bool,
    config: &Config,
) -> Result<(), WalletError> {
    for address in addresses {
        validate_address(address.as_ref(), integrated_allowed, config)?;
    }
    Ok(())
}

pub fn validate_payment_id(payment_id: &str) -> Result<(), WalletError> {
    if payment_id.len() != PAYMENT_ID_LENGTH {
        return Err(WalletError::PaymentIdWrongLength);
    }
    if !payment_id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(WalletError::PaymentIdInvalid);
    }
    Ok(())
}

/// Embeds `payment_id` in a standard address.
///
/// # Errors
///
/// Any address validation error (an integrated input address is
/// `AddressIsIntegrated`), or a payment ID error.
pub fn create_integrated_address(
    address: &str,
    payment_id: &str,
    config: &Config,
) -> Result<String, WalletError> {
    let decoded = validate_address(address, false, config)?;
    validate_payment_id(payment_id)?;

    Ok(encode_address(
        &decoded.public_spend_key,
        &decoded.public_view_key,
        Some(payment_id),
        config.address_prefix,
    ))
}

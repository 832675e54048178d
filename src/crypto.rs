//! Wallet encryption and key derivation.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::WalletError;

const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 32;

const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_LANES: u32 = 1;

/// Derives an AES-256 key from the password bytes with Argon2id.
pub fn derive_encryption_key(
    password: &[u8],
    salt: &[u8; SALT_SIZE],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, WalletError> {
    let params = ParamsBuilder::new()
        .m_cost(ARGON2_MEMORY_KIB)
        .t_cost(ARGON2_ITERATIONS)
        .p_cost(ARGON2_LANES)
        .output_len(KEY_SIZE)
        .build()
        .map_err(|e| WalletError::Encryption(format!("argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password, salt, &mut *key)
        .map_err(|e| WalletError::Encryption(format!("key derivation: {}", e)))?;

    Ok(key)
}

pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Generates a cryptographically secure random nonce for AES-GCM.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn encrypt_wallet_data(
    data: &[u8],
    password: &[u8],
    salt: &[u8; SALT_SIZE],
    nonce: &[u8; NONCE_SIZE],
) -> Result<Vec<u8>, WalletError> {
    let key = derive_encryption_key(password, salt)?;

    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| WalletError::Encryption(format!("cipher: {}", e)))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), data)
        .map_err(|e| WalletError::Encryption(e.to_string()))
}

/// # Errors
///
/// `WrongPassword` when the tag does not authenticate, which is also what
/// corrupted ciphertext looks like.
pub fn decrypt_wallet_data(
    ciphertext: &[u8],
    password: &[u8],
    salt: &[u8; SALT_SIZE],
    nonce: &[u8; NONCE_SIZE],
) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let key = derive_encryption_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| WalletError::Encryption(format!("cipher: {}", e)))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::WrongPassword)
}

//! CryptoNote key and hash primitives over ed25519.
//!
//! Curve arithmetic comes from `curve25519-dalek`. The only piece implemented
//! here is the field map inside `hash_to_ec`, which dalek does not expose.

use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use num_bigint::BigUint;
use rand_core::{OsRng, RngCore};
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::WalletError;

pub type PublicKey = [u8; 32];
pub type PrivateKey = [u8; 32];
pub type KeyImage = [u8; 32];
pub type Hash = [u8; 32];
pub type KeyDerivation = [u8; 32];

/// Montgomery `A` coefficient of curve25519.
const MONTGOMERY_A: u32 = 486662;

#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Keccak-256 with the original (pre-SHA3) padding.
pub fn cn_fast_hash(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    Scalar::from_bytes_mod_order(cn_fast_hash(data))
}

pub fn sc_reduce32(bytes: &[u8; 32]) -> PrivateKey {
    Scalar::from_bytes_mod_order(*bytes).to_bytes()
}

/// True when `bytes` is a canonical scalar, i.e. already reduced mod l.
pub fn is_canonical_scalar(bytes: &PrivateKey) -> bool {
    bool::from(Scalar::from_canonical_bytes(*bytes).is_some())
}

/// True when `key` decompresses to a curve point.
pub fn check_key(key: &PublicKey) -> bool {
    CompressedEdwardsY(*key).decompress().is_some()
}

fn scalar_from_private(key: &PrivateKey) -> Result<Scalar, WalletError> {
    Option::from(Scalar::from_canonical_bytes(*key))
        .ok_or_else(|| WalletError::InvalidKeyFormat("private key is not a reduced scalar".to_string()))
}

fn point_from_public(key: &PublicKey) -> Result<EdwardsPoint, WalletError> {
    CompressedEdwardsY(*key)
        .decompress()
        .ok_or_else(|| WalletError::InvalidKeyFormat("public key is not a curve point".to_string()))
}

pub fn secret_key_to_public_key(private_key: &PrivateKey) -> Result<PublicKey, WalletError> {
    let scalar = Zeroizing::new(scalar_from_private(private_key)?);
    Ok(EdwardsPoint::mul_base(&scalar).compress().to_bytes())
}

/// Key pair for `bytes` reduced mod l.
pub fn key_pair_from_bytes(bytes: &[u8; 32]) -> KeyPair {
    let scalar = Zeroizing::new(Scalar::from_bytes_mod_order(*bytes));
    KeyPair {
        public_key: EdwardsPoint::mul_base(&scalar).compress().to_bytes(),
        private_key: scalar.to_bytes(),
    }
}

/// Generates a random key pair.
pub fn generate_keys() -> KeyPair {
    let mut wide = Zeroizing::new([0u8; 64]);
    OsRng.fill_bytes(&mut *wide);
    let scalar = Zeroizing::new(Scalar::from_bytes_mod_order_wide(&wide));

    KeyPair {
        public_key: EdwardsPoint::mul_base(&scalar).compress().to_bytes(),
        private_key: scalar.to_bytes(),
    }
}

/// `8 * (private_key * public_key)`, shared between sender and recipient.
pub fn generate_key_derivation(
    public_key: &PublicKey,
    private_key: &PrivateKey,
) -> Result<KeyDerivation, WalletError> {
    let point = point_from_public(public_key)?;
    let scalar = Zeroizing::new(scalar_from_private(private_key)?);
    Ok((*scalar * point).mul_by_cofactor().compress().to_bytes())
}

/// `Hs(derivation || varint(output_index))`
pub fn derivation_to_scalar(derivation: &KeyDerivation, output_index: u64) -> Scalar {
    let mut buf = Vec::with_capacity(32 + 10);
    buf.extend_from_slice(derivation);
    write_varint(&mut buf, output_index);
    hash_to_scalar(&buf)
}

/// One-time output key for `base` (a public spend key).
pub fn derive_public_key(
    derivation: &KeyDerivation,
    output_index: u64,
    base: &PublicKey,
) -> Result<PublicKey, WalletError> {
    let base = point_from_public(base)?;
    let offset = derivation_to_scalar(derivation, output_index);
    Ok((EdwardsPoint::mul_base(&offset) + base).compress().to_bytes())
}

/// Inverse of [`derive_public_key`]: recovers the public spend key an output was sent to.
pub fn underive_public_key(
    derivation: &KeyDerivation,
    output_index: u64,
    output_key: &PublicKey,
) -> Result<PublicKey, WalletError> {
    let output = point_from_public(output_key)?;
    let offset = derivation_to_scalar(derivation, output_index);
    Ok((output - EdwardsPoint::mul_base(&offset)).compress().to_bytes())
}

/// One-time output secret key: `Hs(derivation || index) + base`.
pub fn derive_secret_key(
    derivation: &KeyDerivation,
    output_index: u64,
    base: &PrivateKey,
) -> Result<Zeroizing<PrivateKey>, WalletError> {
    let base = Zeroizing::new(scalar_from_private(base)?);
    let derived = Zeroizing::new(derivation_to_scalar(derivation, output_index) + *base);
    Ok(Zeroizing::new(derived.to_bytes()))
}

/// `x * Hp(P)` for an output key `P` with secret `x`.
pub fn generate_key_image(
    output_key: &PublicKey,
    output_secret: &PrivateKey,
) -> Result<KeyImage, WalletError> {
    let secret = Zeroizing::new(scalar_from_private(output_secret)?);
    let hashed = hash_to_ec(output_key).ok_or_else(|| {
        WalletError::InvalidKeyFormat("output key does not map to a curve point".to_string())
    })?;
    Ok((*secret * hashed).compress().to_bytes())
}

fn field_prime() -> BigUint {
    (BigUint::from(1u32) << 255usize) - BigUint::from(19u32)
}

fn is_zero(value: &BigUint) -> bool {
    value.bits() == 0
}

/// Maps bytes to a point in the prime-order subgroup.
///
/// Keccak the input, run it through `ge_fromfe_frombytes_vartime`, then clear
/// the cofactor. The map recovers `y = (z - w) / (z + w)` and the sign of `x`,
/// and lets dalek decompress the point.
pub fn hash_to_ec(data: &[u8]) -> Option<EdwardsPoint> {
    let p = field_prime();
    let sub = |a: &BigUint, b: &BigUint| (a + &p - b) % &p;
    let a = BigUint::from(MONTGOMERY_A);

    let u = BigUint::from_bytes_le(&cn_fast_hash(data)) % &p;
    let v = &u * &u * 2u32 % &p;
    let w = (&v + 1u32) % &p;
    let x = sub(&(&w * &w % &p), &(&a * &a % &p * &v % &p));

    // w * x^3 * (w * x^7)^((p - 5) / 8)
    let exponent = (&p - 5u32) >> 3usize;
    let x3 = x.modpow(&BigUint::from(3u32), &p);
    let x7 = x.modpow(&BigUint::from(7u32), &p);
    let r = &w * &x3 % &p * (&w * &x7 % &p).modpow(&exponent, &p) % &p;
    let check = &r * &r % &p * &x % &p;

    let negative = !is_zero(&sub(&w, &check)) && !is_zero(&((&w + &check) % &p));
    let zero = BigUint::from(0u32);
    let z = if negative {
        sub(&zero, &a)
    } else {
        sub(&zero, &(&a * &v % &p))
    };

    let denominator = (&z + &w) % &p;
    if is_zero(&denominator) {
        return None;
    }
    let y = sub(&z, &w) * denominator.modpow(&(&p - 2u32), &p) % &p;

    let mut bytes = [0u8; 32];
    let y_bytes = y.to_bytes_le();
    bytes[..y_bytes.len()].copy_from_slice(&y_bytes);
    if negative {
        bytes[31] |= 0x80;
    }

    CompressedEdwardsY(bytes)
        .decompress()
        .map(|point| point.mul_by_cofactor())
}

pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Returns the decoded value and the number of bytes consumed.
pub fn read_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        let shift = 7 * i as u32;
        let bits = u64::from(byte & 0x7f);
        if shift == 63 && bits > 1 {
            return None;
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Parses a 64-character hex key.
pub fn key_from_hex(hex_key: &str) -> Result<[u8; 32], WalletError> {
    let mut key = [0u8; 32];
    hex::decode_to_slice(hex_key, &mut key)
        .map_err(|e| WalletError::InvalidKeyFormat(format!("expected 64 hex characters: {}", e)))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::traits::IsIdentity;

    fn hex32(s: &str) -> [u8; 32] {
        key_from_hex(s).unwrap()
    }

    #[test]
    fn test_public_key_from_private() {
        let private = hex32("55e0aa4ca65c0ae016c7364eec313f56fc162901ead0e38a9f846686ac78560f");
        let public = secret_key_to_public_key(&private).unwrap();
        assert_eq!(
            hex::encode(public),
            "ff9b6e048297ee435d6219005974c2c8df620a4aca9ca5c4e13f071823482029"
        );
    }

    #[test]
    fn test_non_canonical_private_key_rejected() {
        assert!(secret_key_to_public_key(&[0xff; 32]).is_err());
        assert!(!is_canonical_scalar(&[0xff; 32]));
        assert!(is_canonical_scalar(&sc_reduce32(&[0xff; 32])));
    }

    #[test]
    fn test_derivation_is_symmetric() {
        let recipient = generate_keys();
        let tx = generate_keys();

        let sender_side = generate_key_derivation(&recipient.public_key, &tx.private_key).unwrap();
        let recipient_side = generate_key_derivation(&tx.public_key, &recipient.private_key).unwrap();
        assert_eq!(sender_side, recipient_side);
    }

    #[test]
    fn test_underive_recovers_spend_key() {
        let spend = generate_keys();
        let view = generate_keys();
        let tx = generate_keys();
        let derivation = generate_key_derivation(&view.public_key, &tx.private_key).unwrap();

        for index in [0u64, 1, 7, 300] {
            let output = derive_public_key(&derivation, index, &spend.public_key).unwrap();
            assert_ne!(output, spend.public_key);
            assert_eq!(
                underive_public_key(&derivation, index, &output).unwrap(),
                spend.public_key
            );
        }
    }

    #[test]
    fn test_derived_secret_matches_output_key() {
        let spend = generate_keys();
        let view = generate_keys();
        let tx = generate_keys();
        let derivation = generate_key_derivation(&view.public_key, &tx.private_key).unwrap();

        let output = derive_public_key(&derivation, 2, &spend.public_key).unwrap();
        let secret = derive_secret_key(&derivation, 2, &spend.private_key).unwrap();
        assert_eq!(secret_key_to_public_key(&secret).unwrap(), output);
    }

    #[test]
    fn test_key_image_is_deterministic_and_distinct() {
        let a = generate_keys();
        let b = generate_keys();

        let image_a = generate_key_image(&a.public_key, &a.private_key).unwrap();
        assert_eq!(image_a, generate_key_image(&a.public_key, &a.private_key).unwrap());
        assert_ne!(image_a, generate_key_image(&b.public_key, &b.private_key).unwrap());
        assert!(check_key(&image_a));
    }

    #[test]
    fn test_hash_to_ec_lands_in_prime_order_subgroup() {
        for seed in 0u8..16 {
            let point = hash_to_ec(&[seed; 32]).expect("point");
            assert!(point.is_torsion_free());
            assert!(!point.is_identity());
        }
    }

    #[test]
    fn test_varint() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 375936);
        assert_eq!(hex::encode(&buf), "80f916");
        assert_eq!(read_varint(&buf), Some((375936, 3)));

        let mut small = Vec::new();
        write_varint(&mut small, 0x7f);
        assert_eq!(small, vec![0x7f]);

        assert_eq!(read_varint(&[0x80, 0x80]), None);
    }

    #[test]
    fn test_key_from_hex_rejects_bad_input() {
        assert!(key_from_hex("").is_err());
        assert!(key_from_hex(&"zz".repeat(32)).is_err());
        assert!(key_from_hex(&"00".repeat(31)).is_err());
    }
}

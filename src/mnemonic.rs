//! 25-word mnemonic seeds.
//!
//! Every 4 bytes of the private spend key become 3 words. A 25th word,
//! chosen by a CRC32 over the word prefixes, acts as a checksum.

use crc::{Crc, CRC_32_ISO_HDLC};
use zeroize::Zeroizing;

use crate::primitives::{sc_reduce32, PrivateKey};
use crate::wordlist::{ENGLISH, UNIQUE_PREFIX_LENGTH};
use crate::WalletError;

const WORDS_WITHOUT_CHECKSUM: usize = 24;
const WORDS_WITH_CHECKSUM: usize = 25;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

fn word_index(word: &str) -> Option<usize> {
    ENGLISH.binary_search(&word).ok()
}

/// True when `word` is in the English wordlist.
pub fn is_valid_mnemonic_word(word: &str) -> bool {
    word_index(&word.trim().to_lowercase()).is_some()
}

fn checksum_index(words: &[impl AsRef<str>]) -> usize {
    let prefixes: String = words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            // Safe to slice by chars: every wordlist entry is ASCII.
            &word[..UNIQUE_PREFIX_LENGTH.min(word.len())]
        })
        .collect();

    CRC32.checksum(prefixes.as_bytes()) as usize % words.len()
}

/// Encodes a private spend key as 25 words, checksum included.
pub fn private_key_to_mnemonic(private_key: &PrivateKey) -> String {
    let n = ENGLISH.len() as u64;
    let mut words: Vec<&'static str> = Vec::with_capacity(WORDS_WITH_CHECKSUM);

    for chunk in private_key.chunks_exact(4) {
        let x = u64::from(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        let w1 = x % n;
        let w2 = (x / n + w1) % n;
        let w3 = (x / n / n + w2) % n;
        words.extend([ENGLISH[w1 as usize], ENGLISH[w2 as usize], ENGLISH[w3 as usize]]);
    }

    words.push(words[checksum_index(&words)]);
    words.join(" ")
}

/// Decodes a 24 or 25 word mnemonic to the private spend key it encodes.
///
/// # Errors
///
/// `MnemonicWrongLength` for the wrong word count, otherwise `InvalidMnemonic`
/// naming the unknown word, the checksum failure, or the impossible word triple.
pub fn mnemonic_to_private_key(mnemonic: &str) -> Result<Zeroizing<PrivateKey>, WalletError> {
    let words: Vec<String> = mnemonic
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();

    if words.len() != WORDS_WITHOUT_CHECKSUM && words.len() != WORDS_WITH_CHECKSUM {
        return Err(WalletError::MnemonicWrongLength(words.len()));
    }

    let mut indices = Vec::with_capacity(words.len());
    for (position, word) in words.iter().enumerate() {
        let index = word_index(word).ok_or_else(|| {
            WalletError::InvalidMnemonic(format!(
                "word {} ({:?}) is not in the english word list",
                position + 1,
                word
            ))
        })?;
        indices.push(index as u64);
    }

    if words.len() == WORDS_WITH_CHECKSUM {
        let data_words = &words[..WORDS_WITHOUT_CHECKSUM];
        let expected = &data_words[checksum_index(data_words)];
        if expected != &words[WORDS_WITHOUT_CHECKSUM] {
            return Err(WalletError::InvalidMnemonic(
                "invalid checksum word".to_string(),
            ));
        }
    }

    let n = ENGLISH.len() as u64;
    let mut key = Zeroizing::new([0u8; 32]);
    for (chunk, triple) in key
        .chunks_exact_mut(4)
        .zip(indices[..WORDS_WITHOUT_CHECKSUM].chunks_exact(3))
    {
        let (w1, w2, w3) = (triple[0], triple[1], triple[2]);
        let x = w1 + n * ((n - w1 + w2) % n) + n * n * ((n - w2 + w3) % n);

        if x % n != w1 || x > u64::from(u32::MAX) {
            return Err(WalletError::InvalidMnemonic(
                "invalid word combination".to_string(),
            ));
        }

        chunk.copy_from_slice(&(x as u32).to_le_bytes());
    }

    Ok(Zeroizing::new(sc_reduce32(&key)))
}

/// Checks a mnemonic without keeping the key it decodes to.
pub fn is_valid_mnemonic(mnemonic: &str) -> Result<(), WalletError> {
    mnemonic_to_private_key(mnemonic).map(|_| ())
}

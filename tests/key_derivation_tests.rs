mod test_helpers;

use std::sync::Arc;

use test_helpers::*;
use wallet_backend::{
    is_valid_mnemonic, is_valid_mnemonic_word, Config, MockDaemon, WalletBackend, WalletErrorCode, WalletKeys,
};

const NUGGET_SEED: &str = "nugget lazy gang sonic vulture exit veteran poverty affair ringing opus soapy sonic afield dating lectures worry tuxedo ruffled rated locker bested aunt bifocals opus";

fn daemon() -> Arc<MockDaemon> {
    Arc::new(MockDaemon::new("127.0.0.1", 11898))
}

#[test]
fn test_import_from_seed() {
    let wallet = WalletBackend::import_wallet_from_seed(daemon(), 0, VIDEO_SEED, Config::default()).unwrap();

    assert_eq!(wallet.get_primary_address(), VIDEO_ADDRESS);
    assert_eq!(
        wallet.get_primary_address_private_keys(),
        (VIDEO_PRIVATE_SPEND_KEY.to_string(), VIDEO_PRIVATE_VIEW_KEY.to_string())
    );
    assert_eq!(wallet.get_mnemonic_seed().unwrap(), VIDEO_SEED);
}

#[test]
fn test_import_from_keys_matches_seed() {
    let wallet = WalletBackend::import_wallet_from_keys(
        daemon(),
        0,
        VIDEO_PRIVATE_VIEW_KEY,
        VIDEO_PRIVATE_SPEND_KEY,
        Config::default(),
    )
    .unwrap();

    assert_eq!(wallet.get_primary_address(), VIDEO_ADDRESS);
    assert_eq!(wallet.get_mnemonic_seed().unwrap(), VIDEO_SEED);
    assert_eq!(wallet.get_mnemonic_seed_for_address(VIDEO_ADDRESS).unwrap(), VIDEO_SEED);
}

#[test]
fn test_non_deterministic_keys_have_no_seed() {
    let wallet = WalletBackend::import_wallet_from_keys(
        daemon(),
        0,
        "1f3f6c220dd9f97619dbf44d967f79f3041b9b1c63da2c895f980f1411d5d704",
        "55e0aa4ca65c0ae016c7364eec313f56fc162901ead0e38a9f846686ac78560f",
        Config::default(),
    )
    .unwrap();

    assert_eq!(
        wallet.get_mnemonic_seed().unwrap_err().code(),
        WalletErrorCode::KeysNotDeterministic
    );
}

#[test]
fn test_bad_key_hex() {
    let err = WalletBackend::import_wallet_from_keys(daemon(), 0, "zz", VIDEO_PRIVATE_SPEND_KEY, Config::default())
        .unwrap_err();
    assert_eq!(err.code(), WalletErrorCode::InvalidKeyFormat);

    let err = WalletBackend::import_wallet_from_keys(
        daemon(),
        0,
        VIDEO_PRIVATE_VIEW_KEY,
        &VIDEO_PRIVATE_SPEND_KEY[..62],
        Config::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), WalletErrorCode::InvalidKeyFormat);
}

#[test]
fn test_mnemonic_validity() {
    assert!(is_valid_mnemonic(NUGGET_SEED).is_ok());
    assert!(is_valid_mnemonic(VIDEO_SEED).is_ok());

    let bad_checksum = format!("{} soapy", &NUGGET_SEED[..NUGGET_SEED.rfind(' ').unwrap()]);
    assert_eq!(
        is_valid_mnemonic(&bad_checksum).unwrap_err().code(),
        WalletErrorCode::InvalidMnemonic
    );

    let unknown_word = format!("a{}", &NUGGET_SEED[NUGGET_SEED.find(' ').unwrap()..]);
    assert_eq!(
        is_valid_mnemonic(&unknown_word).unwrap_err().code(),
        WalletErrorCode::InvalidMnemonic
    );

    assert_eq!(is_valid_mnemonic("").unwrap_err().code(), WalletErrorCode::MnemonicWrongLength);
    assert_eq!(
        is_valid_mnemonic("nugget lazy gang").unwrap_err().code(),
        WalletErrorCode::MnemonicWrongLength
    );
}

#[test]
fn test_mnemonic_words() {
    assert!(is_valid_mnemonic_word("abbey"));
    assert!(is_valid_mnemonic_word("nugget"));
    assert!(!is_valid_mnemonic_word("aaaaa"));
    assert!(!is_valid_mnemonic_word(""));
}

#[test]
fn test_import_invalid_seed() {
    let err = WalletBackend::import_wallet_from_seed(daemon(), 0, "not a seed", Config::default()).unwrap_err();
    assert_eq!(err.code(), WalletErrorCode::MnemonicWrongLength);
}

#[test]
fn test_created_wallets_are_deterministic() {
    let wallet = WalletBackend::create_wallet(daemon(), Config::default());
    let seed = wallet.get_mnemonic_seed().unwrap();
    assert_eq!(seed.split_whitespace().count(), 25);

    let restored = WalletBackend::import_wallet_from_seed(daemon(), 0, &seed, Config::default()).unwrap();
    assert_eq!(restored.get_primary_address(), wallet.get_primary_address());
    assert_eq!(restored.get_private_view_key(), wallet.get_private_view_key());
}

#[test]
fn test_keys_from_seed() {
    let keys = WalletKeys::from_mnemonic(NUGGET_SEED).unwrap();
    assert!(keys.is_deterministic());
    assert_eq!(keys.to_mnemonic().unwrap(), NUGGET_SEED);
}

#[test]
fn test_view_wallet_keys() {
    let wallet = WalletBackend::import_view_wallet(
        daemon(),
        0,
        VIDEO_PRIVATE_VIEW_KEY,
        VIDEO_ADDRESS,
        Config::default(),
    )
    .unwrap();

    assert!(wallet.is_view_wallet());
    assert_eq!(wallet.get_private_view_key(), VIDEO_PRIVATE_VIEW_KEY);
    assert_eq!(
        wallet.get_primary_address_private_keys(),
        ("0".repeat(64), VIDEO_PRIVATE_VIEW_KEY.to_string())
    );

    assert_eq!(
        wallet.get_spend_keys(VIDEO_ADDRESS).unwrap_err().code(),
        WalletErrorCode::IllegalViewWalletOperation
    );
    assert_eq!(
        wallet.get_mnemonic_seed().unwrap_err().code(),
        WalletErrorCode::IllegalViewWalletOperation
    );
}

#[test]
fn test_view_wallet_needs_matching_view_key() {
    let other = WalletKeys::generate();
    let err = WalletBackend::import_view_wallet(
        daemon(),
        0,
        &hex::encode(other.view.private_key),
        VIDEO_ADDRESS,
        Config::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), WalletErrorCode::InvalidKeyFormat);
}

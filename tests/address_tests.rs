mod test_helpers;

use std::sync::Arc;

use test_helpers::*;
use wallet_backend::{
    create_integrated_address, decode_address, pretty_print_amount, validate_address, validate_addresses,
    Config, MockDaemon, WalletBackend, WalletErrorCode,
};

const PAYMENT_ID: &str = "b23df6e84c1dd619f0a2e7cb5b5ecf0e3e06f6d5d3e4c8b9a7f6e5d4c3b2a190";
const INTEGRATED_ADDRESS: &str = "NaCaaXf4qL1A6hoGpD7U4TA4jWt4KUVggAGLSF3tH64JJ6Myt2QuxyBA6faPh5hv2vARzZSkvh4hz9vxtstYayVr9EXfS6hudQPSGYPYzagBJEN9Tovgx8fv2dhZ5tXSGw4WAyE5TsP44JaaEkPX9zNR86bnBH7M1RJYjCC6zdFTn8Lg1atLRFWdyp";

/// The video address's keys under prefix 375937.
const OTHER_PREFIX_ADDRESS: &str = "NjuFrqoySXmSGYPYzagBJEN9Tovgx8fv2dhZ5tXSGw4WAyE5TsP44JaaEkPX9zNR86bnBH7M1RJYjCC6zdFTn8Lg1atLNb4LGy";

const NON_DETERMINISTIC_SPEND: &str = "55e0aa4ca65c0ae016c7364eec313f56fc162901ead0e38a9f846686ac78560f";
const NON_DETERMINISTIC_VIEW: &str = "1f3f6c220dd9f97619dbf44d967f79f3041b9b1c63da2c895f980f1411d5d704";

fn code(address: &str, integrated_allowed: bool) -> Option<WalletErrorCode> {
    validate_address(address, integrated_allowed, &Config::default())
        .err()
        .map(|e| e.code())
}

#[test]
fn test_validate_address() {
    assert_eq!(code(VIDEO_ADDRESS, false), None);
    assert_eq!(code("", false), Some(WalletErrorCode::AddressWrongLength));
    assert_eq!(code(&VIDEO_ADDRESS[1..], false), Some(WalletErrorCode::AddressWrongLength));

    let mut not_base58 = VIDEO_ADDRESS.to_string();
    not_base58.replace_range(10..11, "0");
    assert_eq!(code(&not_base58, false), Some(WalletErrorCode::AddressNotBase58));

    assert_eq!(code(OTHER_PREFIX_ADDRESS, false), Some(WalletErrorCode::AddressWrongPrefix));
    let other_config = Config::default().with_address_prefix(375937);
    assert!(validate_address(OTHER_PREFIX_ADDRESS, false, &other_config).is_ok());

    let mut bad_checksum = VIDEO_ADDRESS.to_string();
    bad_checksum.replace_range(97..98, if VIDEO_ADDRESS.ends_with('m') { "n" } else { "m" });
    assert_eq!(code(&bad_checksum, false), Some(WalletErrorCode::AddressNotValid));
}

#[test]
fn test_length_is_checked_before_alphabet() {
    // Wrong length and not base58: length wins.
    assert_eq!(code("0OIl", false), Some(WalletErrorCode::AddressWrongLength));
}

#[test]
fn test_non_default_prefix() {
    let config = Config::default().with_address_prefix(8411);
    let wallet = WalletBackend::import_wallet_from_keys(
        Arc::new(MockDaemon::new("127.0.0.1", 11898)),
        0,
        NON_DETERMINISTIC_VIEW,
        NON_DETERMINISTIC_SPEND,
        config,
    )
    .unwrap();

    assert_eq!(
        wallet.get_primary_address(),
        "dg5NZstxyAegrTA1Z771tPZaf13V6YHAjUjAieQfjwCb6P1eYHuMmwRcDcQ1eAs41sQrh98FjBXn257HZzh2CCwE2spKE2gmA"
    );
    assert!(wallet.validate_address(&wallet.get_primary_address(), false).is_ok());

    // The same keys under the default prefix.
    let wallet = WalletBackend::import_wallet_from_keys(
        Arc::new(MockDaemon::new("127.0.0.1", 11898)),
        0,
        NON_DETERMINISTIC_VIEW,
        NON_DETERMINISTIC_SPEND,
        Config::default(),
    )
    .unwrap();
    assert_eq!(
        wallet.get_primary_address(),
        "NaCatHhXYSDSQvG1gYAGELLXj9s9Ys3KoTCgHVstUqb8D4i82NkV3qz7ADzgFxD99JTXCmn6qNwgv5Xs9bi49iiV9Qd1gS83C9"
    );
}

#[test]
fn test_integrated_address() {
    let config = Config::default();
    let integrated = create_integrated_address(VIDEO_ADDRESS, PAYMENT_ID, &config).unwrap();
    assert_eq!(integrated, INTEGRATED_ADDRESS);
    assert_eq!(integrated.len(), 186);

    let decoded = decode_address(&integrated).unwrap();
    assert!(decoded.is_integrated());
    assert_eq!(decoded.payment_id.as_deref(), Some(PAYMENT_ID));
    assert_eq!(decoded.public_spend_key, decode_address(VIDEO_ADDRESS).unwrap().public_spend_key);

    assert_eq!(code(&integrated, false), Some(WalletErrorCode::AddressIsIntegrated));
    assert_eq!(code(&integrated, true), None);
}

#[test]
fn test_integrated_address_errors() {
    let config = Config::default();
    let err = |address: &str, payment_id: &str| {
        create_integrated_address(address, payment_id, &config).unwrap_err().code()
    };

    assert_eq!(err("", PAYMENT_ID), WalletErrorCode::AddressWrongLength);
    assert_eq!(err(VIDEO_ADDRESS, ""), WalletErrorCode::PaymentIdWrongLength);
    assert_eq!(err(VIDEO_ADDRESS, &PAYMENT_ID[..63]), WalletErrorCode::PaymentIdWrongLength);
    assert_eq!(err(VIDEO_ADDRESS, &"x".repeat(64)), WalletErrorCode::PaymentIdInvalid);
    assert_eq!(err(INTEGRATED_ADDRESS, PAYMENT_ID), WalletErrorCode::AddressIsIntegrated);
}

#[test]
fn test_validate_addresses() {
    let config = Config::default();
    assert!(validate_addresses(&[VIDEO_ADDRESS, INTEGRATED_ADDRESS], true, &config).is_ok());

    let err = validate_addresses(&[VIDEO_ADDRESS, INTEGRATED_ADDRESS], false, &config).unwrap_err();
    assert_eq!(err.code(), WalletErrorCode::AddressIsIntegrated);

    let err = validate_addresses(&[VIDEO_ADDRESS, "short"], true, &config).unwrap_err();
    assert_eq!(err.code(), WalletErrorCode::AddressWrongLength);

    let empty: [&str; 0] = [];
    assert!(validate_addresses(&empty, false, &config).is_ok());
}

#[test]
fn test_pretty_print_amount() {
    let config = Config::default();
    assert_eq!(pretty_print_amount(1234567899874, &config), "12,345.67899874 NaCa");
    assert_eq!(pretty_print_amount(0, &config), "0.00000000 NaCa");
    assert_eq!(pretty_print_amount(-1212341234, &config), "-12.12341234 NaCa");
    assert_eq!(pretty_print_amount(100_000_000, &config), "1.00000000 NaCa");

    let two_places = Config::default().with_decimal_places(2).with_ticker("TRTL");
    assert_eq!(pretty_print_amount(123456789, &two_places), "1,234,567.89 TRTL");
}

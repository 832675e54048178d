//! Wallet error type.

use std::fmt;

use thiserror::Error;

/// Every failure a wallet operation can return.
///
/// Callers that need a stable identifier (FFI, logs, persisted job state)
/// should match on [`WalletError::code`] rather than the display text.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("not a wallet file: {0}")]
    NotAWalletFile(String),

    #[error("wrong password, or the wallet data is corrupted")]
    WrongPassword,

    #[error("unsupported wallet file format version {0}")]
    UnsupportedWalletFileFormatVersion(u32),

    #[error("failed to parse wallet data: {0}")]
    ParseFailure(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("mnemonic has {0} words, expected 24 or 25")]
    MnemonicWrongLength(usize),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("address has the wrong length")]
    AddressWrongLength,

    #[error("address contains characters outside the base58 alphabet")]
    AddressNotBase58,

    #[error("address has the wrong prefix")]
    AddressWrongPrefix,

    #[error("address is not valid")]
    AddressNotValid,

    #[error("integrated addresses are not allowed here")]
    AddressIsIntegrated,

    #[error("address is not present in this wallet")]
    AddressNotInWallet,

    #[error("payment ID must be 64 hex characters")]
    PaymentIdWrongLength,

    #[error("payment ID is not valid hex")]
    PaymentIdInvalid,

    #[error("invalid key: {0}")]
    InvalidKeyFormat(String),

    #[error("private keys are not deterministic, no mnemonic seed is available")]
    KeysNotDeterministic,

    #[error("operation requires private spend keys, but this is a view wallet")]
    IllegalViewWalletOperation,

    #[error("operation is only valid on a view wallet")]
    IllegalNonViewWalletOperation,

    #[error("a subwallet with this spend key already exists")]
    SubWalletAlreadyExists,

    #[error("the primary address cannot be deleted")]
    CannotDeletePrimaryAddress,

    #[error("daemon error: {0}")]
    Daemon(#[from] crate::daemon::DaemonError),
}

/// Stable numeric codes for [`WalletError`].
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletErrorCode {
    FilesystemError = 1,
    NotAWalletFile = 2,
    WrongPassword = 3,
    UnsupportedWalletFileFormatVersion = 4,
    ParseFailure = 5,
    EncryptionFailure = 6,
    MnemonicWrongLength = 7,
    InvalidMnemonic = 8,
    AddressWrongLength = 9,
    AddressNotBase58 = 10,
    AddressWrongPrefix = 11,
    AddressNotValid = 12,
    AddressIsIntegrated = 13,
    AddressNotInWallet = 14,
    PaymentIdWrongLength = 15,
    PaymentIdInvalid = 16,
    InvalidKeyFormat = 17,
    KeysNotDeterministic = 18,
    IllegalViewWalletOperation = 19,
    IllegalNonViewWalletOperation = 20,
    SubWalletAlreadyExists = 21,
    CannotDeletePrimaryAddress = 22,
    DaemonError = 23,
}

impl WalletErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FilesystemError => "FILESYSTEM_ERROR",
            Self::NotAWalletFile => "NOT_A_WALLET_FILE",
            Self::WrongPassword => "WRONG_PASSWORD",
            Self::UnsupportedWalletFileFormatVersion => "UNSUPPORTED_WALLET_FILE_FORMAT_VERSION",
            Self::ParseFailure => "PARSE_FAILURE",
            Self::EncryptionFailure => "ENCRYPTION_FAILURE",
            Self::MnemonicWrongLength => "MNEMONIC_WRONG_LENGTH",
            Self::InvalidMnemonic => "INVALID_MNEMONIC",
            Self::AddressWrongLength => "ADDRESS_WRONG_LENGTH",
            Self::AddressNotBase58 => "ADDRESS_NOT_BASE58",
            Self::AddressWrongPrefix => "ADDRESS_WRONG_PREFIX",
            Self::AddressNotValid => "ADDRESS_NOT_VALID",
            Self::AddressIsIntegrated => "ADDRESS_IS_INTEGRATED",
            Self::AddressNotInWallet => "ADDRESS_NOT_IN_WALLET",
            Self::PaymentIdWrongLength => "PAYMENT_ID_WRONG_LENGTH",
            Self::PaymentIdInvalid => "PAYMENT_ID_INVALID",
            Self::InvalidKeyFormat => "INVALID_KEY_FORMAT",
            Self::KeysNotDeterministic => "KEYS_NOT_DETERMINISTIC",
            Self::IllegalViewWalletOperation => "ILLEGAL_VIEW_WALLET_OPERATION",
            Self::IllegalNonViewWalletOperation => "ILLEGAL_NON_VIEW_WALLET_OPERATION",
            Self::SubWalletAlreadyExists => "SUBWALLET_ALREADY_EXISTS",
            Self::CannotDeletePrimaryAddress => "CANNOT_DELETE_PRIMARY_ADDRESS",
            Self::DaemonError => "DAEMON_ERROR",
        }
    }
}

impl fmt::Display for WalletErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WalletError {
    pub fn code(&self) -> WalletErrorCode {
        match self {
            Self::Filesystem(_) => WalletErrorCode::FilesystemError,
            Self::NotAWalletFile(_) => WalletErrorCode::NotAWalletFile,
            Self::WrongPassword => WalletErrorCode::WrongPassword,
            Self::UnsupportedWalletFileFormatVersion(_) => {
                WalletErrorCode::UnsupportedWalletFileFormatVersion
            }
            Self::ParseFailure(_) => WalletErrorCode::ParseFailure,
            Self::Encryption(_) => WalletErrorCode::EncryptionFailure,
            Self::MnemonicWrongLength(_) => WalletErrorCode::MnemonicWrongLength,
            Self::InvalidMnemonic(_) => WalletErrorCode::InvalidMnemonic,
            Self::AddressWrongLength => WalletErrorCode::AddressWrongLength,
            Self::AddressNotBase58 => WalletErrorCode::AddressNotBase58,
            Self::AddressWrongPrefix => WalletErrorCode::AddressWrongPrefix,
            Self::AddressNotValid => WalletErrorCode::AddressNotValid,
            Self::AddressIsIntegrated => WalletErrorCode::AddressIsIntegrated,
            Self::AddressNotInWallet => WalletErrorCode::AddressNotInWallet,
            Self::PaymentIdWrongLength => WalletErrorCode::PaymentIdWrongLength,
            Self::PaymentIdInvalid => WalletErrorCode::PaymentIdInvalid,
            Self::InvalidKeyFormat(_) => WalletErrorCode::InvalidKeyFormat,
            Self::KeysNotDeterministic => WalletErrorCode::KeysNotDeterministic,
            Self::IllegalViewWalletOperation => WalletErrorCode::IllegalViewWalletOperation,
            Self::IllegalNonViewWalletOperation => WalletErrorCode::IllegalNonViewWalletOperation,
            Self::SubWalletAlreadyExists => WalletErrorCode::SubWalletAlreadyExists,
            Self::CannotDeletePrimaryAddress => WalletErrorCode::CannotDeletePrimaryAddress,
            Self::Daemon(_) => WalletErrorCode::DaemonError,
        }
    }
}

// src/errors.rs

//! Error types for the NMX state machine.
//!
//! Every failure a transaction or block hook can hit is one variant of
//! [`NmxError`]. Variants are grouped by [`ErrorKind`], which decides how
//! the driver reacts: validation, precondition, economic and ordering
//! failures abort only the offending transaction, invariant failures halt
//! the node, and host failures are reported back to the consensus engine.
//!
//! Each variant maps to a stable, non-zero result code through
//! [`NmxError::code`]. Codes are part of the client-visible surface and
//! must never be renumbered.

use nmx_crypto::CryptoError;
use std::fmt;

/// Taxonomy class of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before execution
    Validation,
    /// State does not allow the operation
    Precondition,
    /// Not enough funds, fee or stake
    Economic,
    /// Operation arrived at the wrong point in a sequence
    Ordering,
    /// Consensus-critical breach; the node must halt
    Invariant,
    /// Host interface mismatch or I/O failure
    Host,
}

/// Main error type for NMX operations
#[derive(Debug, Clone, PartialEq)]
pub enum NmxError {
    // ----- validation -----
    /// Address is malformed or has the wrong prefix
    InvalidAddress(String),

    /// Coin set is malformed (bad denom, duplicate, negative amount)
    InvalidCoins(String),

    /// Message failed stateless validation
    InvalidMessage(String),

    /// Neural-network architecture outside the supported set
    UnknownArchitecture(String),

    /// Parameter value outside its allowed range
    InvalidParams(String),

    /// Encoded transaction exceeds the size limit
    TxTooLarge {
        /// Encoded size
        size: usize,
        /// Allowed size
        max: usize,
    },

    /// Memo exceeds the character limit
    MemoTooLong {
        /// Memo length in characters
        len: usize,
        /// Allowed length
        max: usize,
    },

    /// Signature does not verify against the sign document
    InvalidSignature(String),

    // ----- precondition -----
    /// Record not found
    NotFound(String),

    /// Record already exists
    AlreadyExists(String),

    /// Signer is not allowed to perform the operation
    Unauthorized(String),

    /// Record is in a state that forbids the operation
    InvalidState(String),

    /// Signer account does not exist
    AccountNotFound(String),

    /// Transaction sequence does not match the account
    WrongSequence {
        /// Sequence stored on the account
        expected: u64,
        /// Sequence carried by the transaction
        got: u64,
    },

    /// Validator does not exist
    NoValidatorFound(String),

    /// Operator address already has a validator
    ValidatorExists(String),

    /// Consensus key already used by another validator
    ValidatorPubKeyExists(String),

    /// Validator is not bonded
    ValidatorNotBonded(String),

    /// Delegation does not exist
    NoDelegation(String),

    /// Delegation amount exceeds what is held
    InvalidDelegation(String),

    /// Commission rates out of range
    InvalidCommissionRate(String),

    /// Commission was changed less than 24 hours ago
    CommissionUpdateTooSoon(String),

    /// Source and destination validator are the same
    SelfRedelegation,

    /// Source position is itself an immature redelegation
    TransitiveRedelegation(String),

    /// Too many unbonding or redelegation entries
    MaxEntries(String),

    /// Unjail requested for a validator that is not jailed
    ValidatorNotJailed(String),

    /// Validator is tombstoned or still inside its jail period
    ValidatorJailed(String),

    /// Data source is blocked
    DataSourceBlocked(String),

    /// Validator holds shares but no tokens to price them
    InvalidExchangeRate(String),

    // ----- economic -----
    /// Account balance is too low
    InsufficientFunds(String),

    /// Self-delegation is below the validator or module minimum
    SelfDelegationBelowMinimum(String),

    /// Fee is below the required minimum
    InsufficientFee(String),

    /// Gas meter exhausted
    OutOfGas {
        /// Gas limit of the meter
        limit: u64,
        /// Gas consumed when the limit was crossed
        used: u64,
    },

    // ----- ordering -----
    /// Vote arrived after the voting period ended
    VotingClosed(String),

    /// Voter already voted on the proposal
    AlreadyVoted(String),

    /// Voter holds no bonded stake
    NoVotingPower(String),

    // ----- invariant -----
    /// Registered invariant failed; names the violating entity
    InvariantBroken {
        /// Module owning the invariant
        module: String,
        /// Invariant route
        route: String,
        /// Violating entity and values
        detail: String,
    },

    /// Arithmetic overflow on a consensus path
    Overflow(String),

    /// Store is corrupt or a version is missing
    StoreError(String),

    /// Scheduled upgrade has no registered handler
    UpgradeNeeded {
        /// Plan name
        name: String,
        /// Plan height
        height: u64,
    },

    // ----- host -----
    /// Unknown message, query path or request
    UnknownRequest(String),

    /// Encoding or decoding failed
    CodecError(String),

    /// File system failure
    IoError(String),

    /// Cryptographic failure other than address or signature format
    CryptoError(String),
}

impl NmxError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        use NmxError::*;
        match self {
            InvalidAddress(_) | InvalidCoins(_) | InvalidMessage(_) | UnknownArchitecture(_)
            | InvalidParams(_) | TxTooLarge { .. } | MemoTooLong { .. } | InvalidSignature(_) => {
                ErrorKind::Validation
            }
            NotFound(_) | AlreadyExists(_) | Unauthorized(_) | InvalidState(_)
            | AccountNotFound(_) | WrongSequence { .. } | NoValidatorFound(_)
            | ValidatorExists(_) | ValidatorPubKeyExists(_) | ValidatorNotBonded(_)
            | NoDelegation(_) | InvalidDelegation(_) | InvalidCommissionRate(_)
            | CommissionUpdateTooSoon(_) | SelfRedelegation | TransitiveRedelegation(_)
            | MaxEntries(_) | ValidatorNotJailed(_) | ValidatorJailed(_)
            | DataSourceBlocked(_) | InvalidExchangeRate(_) => ErrorKind::Precondition,
            InsufficientFunds(_) | SelfDelegationBelowMinimum(_) | InsufficientFee(_)
            | OutOfGas { .. } => ErrorKind::Economic,
            VotingClosed(_) | AlreadyVoted(_) | NoVotingPower(_) => ErrorKind::Ordering,
            InvariantBroken { .. } | Overflow(_) | StoreError(_) | UpgradeNeeded { .. } => {
                ErrorKind::Invariant
            }
            UnknownRequest(_) | CodecError(_) | IoError(_) | CryptoError(_) => ErrorKind::Host,
        }
    }

    /// Stable result code reported in the transaction envelope
    pub fn code(&self) -> u32 {
        use NmxError::*;
        match self {
            InvalidAddress(_) => 2,
            InvalidCoins(_) => 3,
            InvalidMessage(_) => 4,
            UnknownArchitecture(_) => 5,
            InvalidParams(_) => 6,
            TxTooLarge { .. } => 7,
            MemoTooLong { .. } => 8,
            InvalidSignature(_) => 9,

            NotFound(_) => 20,
            AlreadyExists(_) => 21,
            Unauthorized(_) => 22,
            InvalidState(_) => 23,
            AccountNotFound(_) => 24,
            WrongSequence { .. } => 25,
            NoValidatorFound(_) => 26,
            ValidatorExists(_) => 27,
            ValidatorPubKeyExists(_) => 28,
            ValidatorNotBonded(_) => 29,
            NoDelegation(_) => 30,
            InvalidDelegation(_) => 31,
            InvalidCommissionRate(_) => 32,
            CommissionUpdateTooSoon(_) => 33,
            SelfRedelegation => 34,
            TransitiveRedelegation(_) => 35,
            MaxEntries(_) => 36,
            ValidatorNotJailed(_) => 37,
            ValidatorJailed(_) => 38,
            DataSourceBlocked(_) => 39,
            InvalidExchangeRate(_) => 40,

            InsufficientFunds(_) => 50,
            SelfDelegationBelowMinimum(_) => 51,
            InsufficientFee(_) => 52,
            OutOfGas { .. } => 53,

            VotingClosed(_) => 60,
            AlreadyVoted(_) => 61,
            NoVotingPower(_) => 62,

            InvariantBroken { .. } => 70,
            Overflow(_) => 71,
            StoreError(_) => 72,
            UpgradeNeeded { .. } => 73,

            UnknownRequest(_) => 80,
            CodecError(_) => 81,
            IoError(_) => 82,
            CryptoError(_) => 83,
        }
    }

    /// Whether this error must halt the node rather than fail one transaction
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }
}

impl fmt::Display for NmxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use NmxError::*;
        match self {
            InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            InvalidCoins(msg) => write!(f, "Invalid coins: {}", msg),
            InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            UnknownArchitecture(msg) => write!(f, "Unknown architecture: {}", msg),
            InvalidParams(msg) => write!(f, "Invalid params: {}", msg),
            TxTooLarge { size, max } => write!(f, "Transaction too large: {} > {} bytes", size, max),
            MemoTooLong { len, max } => write!(f, "Memo too long: {} > {} characters", len, max),
            InvalidSignature(msg) => write!(f, "Invalid signature: {}", msg),

            NotFound(msg) => write!(f, "Not found: {}", msg),
            AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AccountNotFound(msg) => write!(f, "Account not found: {}", msg),
            WrongSequence { expected, got } => {
                write!(f, "Wrong sequence: expected {}, got {}", expected, got)
            }
            NoValidatorFound(msg) => write!(f, "Validator not found: {}", msg),
            ValidatorExists(msg) => write!(f, "Validator already exists: {}", msg),
            ValidatorPubKeyExists(msg) => write!(f, "Consensus key already in use: {}", msg),
            ValidatorNotBonded(msg) => write!(f, "Validator not bonded: {}", msg),
            NoDelegation(msg) => write!(f, "Delegation not found: {}", msg),
            InvalidDelegation(msg) => write!(f, "Invalid delegation: {}", msg),
            InvalidCommissionRate(msg) => write!(f, "Invalid commission rate: {}", msg),
            CommissionUpdateTooSoon(msg) => write!(f, "Commission update too soon: {}", msg),
            SelfRedelegation => write!(f, "Cannot redelegate to the same validator"),
            TransitiveRedelegation(msg) => write!(f, "Transitive redelegation: {}", msg),
            MaxEntries(msg) => write!(f, "Too many entries: {}", msg),
            ValidatorNotJailed(msg) => write!(f, "Validator not jailed: {}", msg),
            ValidatorJailed(msg) => write!(f, "Validator jailed: {}", msg),
            DataSourceBlocked(msg) => write!(f, "Data source blocked: {}", msg),
            InvalidExchangeRate(msg) => write!(f, "Invalid exchange rate: {}", msg),

            InsufficientFunds(msg) => write!(f, "Insufficient funds: {}", msg),
            SelfDelegationBelowMinimum(msg) => {
                write!(f, "Self-delegation below minimum: {}", msg)
            }
            InsufficientFee(msg) => write!(f, "Insufficient fee: {}", msg),
            OutOfGas { limit, used } => write!(f, "Out of gas: used {} of {}", used, limit),

            VotingClosed(msg) => write!(f, "Voting closed: {}", msg),
            AlreadyVoted(msg) => write!(f, "Already voted: {}", msg),
            NoVotingPower(msg) => write!(f, "No voting power: {}", msg),

            InvariantBroken { module, route, detail } => {
                write!(f, "Invariant broken: {}/{}: {}", module, route, detail)
            }
            Overflow(msg) => write!(f, "Arithmetic overflow: {}", msg),
            StoreError(msg) => write!(f, "Storage error: {}", msg),
            UpgradeNeeded { name, height } => {
                write!(f, "Upgrade needed: plan \"{}\" at height {}", name, height)
            }

            UnknownRequest(msg) => write!(f, "Unknown request: {}", msg),
            CodecError(msg) => write!(f, "Serialization error: {}", msg),
            IoError(msg) => write!(f, "I/O error: {}", msg),
            CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
        }
    }
}

impl std::error::Error for NmxError {}

impl From<bincode::Error> for NmxError {
    fn from(err: bincode::Error) -> Self {
        NmxError::CodecError(err.to_string())
    }
}

impl From<serde_json::Error> for NmxError {
    fn from(err: serde_json::Error) -> Self {
        NmxError::CodecError(err.to_string())
    }
}

impl From<std::io::Error> for NmxError {
    fn from(err: std::io::Error) -> Self {
        NmxError::IoError(err.to_string())
    }
}

impl From<CryptoError> for NmxError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidAddress(_)
            | CryptoError::WrongPrefix { .. }
            | CryptoError::Bech32Error(_) => NmxError::InvalidAddress(err.to_string()),
            CryptoError::SignatureError(_) => NmxError::InvalidSignature(err.to_string()),
            other => NmxError::CryptoError(other.to_string()),
        }
    }
}

/// Result type alias for NMX operations
pub type Result<T> = std::result::Result<T, NmxError>;

use crate::*;

use thiserror::Error;

/// Broad class of a rejection, used by callers to decide whether to retry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The call is not allowed in the current protocol phase, or its record already moved on.
    PhaseViolation,
    /// A hash, signature or ciphertext did not check out.
    Integrity,
    /// The call refers to an election, voter, edge, request or ciphertext that does not exist.
    Referential,
    /// Something the call depends on has not happened yet. Retry later.
    Readiness,
    /// The call exceeds a budget (oracle requests).
    ResourceExhaustion,
    /// The caller is not allowed to make this call.
    Authorization,
    /// Malformed arguments.
    InvalidInput,
}

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("groupballot: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("groupballot: mismatched public keys")]
    MismatchedPublicKeys,

    #[error("groupballot: invalid identifier - invalid hexidecimal")]
    IdentifierBadHex,

    #[error("groupballot: invalid identifier - wrong length")]
    IdentifierBadLen,

    #[error("groupballot: invalid identifier - unknown transaction type {0}")]
    IdentifierBadType(u8),

    #[error("groupballot: invalid voter id")]
    InvalidVoterId,

    #[error("groupballot: CBOR error deserializing transaction: {0}")]
    CBORDeserialization(#[from] serde_cbor::Error),

    #[error("groupballot: JSON error deserializing transaction: {0}")]
    JSONDeserialization(#[from] serde_json::Error),

    #[error("groupballot: error deserializing transaction: unknown format")]
    DeserializationUnknownFormat,

    #[error("groupballot: key derivation failed")]
    KeyDerivation,

    #[error("groupballot: failed to encrypt vote")]
    EncryptionFailed,

    #[error("groupballot: failed to decrypt vote")]
    DecryptionFailed,

    #[error("groupballot: decrypted vote is malformed")]
    MalformedVote,

    #[error("groupballot: option {0} does not exist")]
    NoSuchOption(usize),

    #[error("groupballot: a vote has already been chosen")]
    AlreadyVoted,

    #[error("groupballot: no vote has been chosen")]
    NoVoteChosen,

    #[error("groupballot: nothing has been committed, so there is nothing to reveal")]
    NothingToReveal,

    #[error("groupballot: no private key-exchange value is held for edge {0}")]
    MissingPrivateValue(Identifier),

    #[error("groupballot: {0}")]
    Validation(#[from] ValidationError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(e) => e.kind(),
            Error::SignatureError(_) | Error::DecryptionFailed | Error::MalformedVote => {
                ErrorKind::Integrity
            }
            Error::AlreadyVoted => ErrorKind::PhaseViolation,
            Error::NoVoteChosen | Error::NothingToReveal | Error::MissingPrivateValue(_) => {
                ErrorKind::Readiness
            }
            _ => ErrorKind::InvalidInput,
        }
    }
}

/// Transaction Validation errors
///
/// Validation runs to completion before anything is written, so a rejected transaction never
/// leaves partial state behind.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("groupballot validation: election authority public key mismatch")]
    AuthorityPublicKeyMismatch,

    #[error("groupballot validation: oracle public key mismatch")]
    OraclePublicKeyMismatch,

    #[error("groupballot validation: voter {0} is not a participant of edge {1}")]
    NotEdgeParticipant(VoterId, Identifier),

    #[error("groupballot validation: not allowed in phase {0}")]
    WrongPhase(ElectionPhase),

    #[error("groupballot validation: voter {0} is already registered")]
    AlreadyRegistered(VoterId),

    #[error("groupballot validation: voter {0} has already committed")]
    AlreadyCommitted(VoterId),

    #[error("groupballot validation: voter {0} has already revealed")]
    AlreadyRevealed(VoterId),

    #[error("groupballot validation: voter {0} already contributed to edge {1}")]
    AlreadyContributed(VoterId, Identifier),

    #[error("groupballot validation: vote from {0} to {1} was already sent")]
    AlreadySent(VoterId, VoterId),

    #[error("groupballot validation: voter {0} already broadcast group totals")]
    AlreadyBroadcast(VoterId),

    #[error("groupballot validation: oracle request {0} was already answered")]
    DuplicateCallback(Identifier),

    #[error("groupballot validation: the oracle value has already been delivered")]
    OracleValueDelivered,

    #[error("groupballot validation: transaction {0} already exists")]
    DuplicateTransaction(Identifier),

    #[error("groupballot validation: revealed value does not match the commitment")]
    HashMismatch,

    #[error("groupballot validation: distribution seed does not match the finalized seed")]
    SeedMismatch,

    #[error("groupballot validation: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("groupballot validation: transaction not found: {0}")]
    TransactionNotFound(#[from] TransactionNotFound),

    #[error("groupballot validation: mismatched transaction type and id type")]
    MismatchedTransactionType,

    #[error("groupballot validation: election mismatch")]
    ElectionMismatch,

    #[error("groupballot validation: voter {0} is not registered")]
    NotRegistered(VoterId),

    #[error("groupballot validation: voter {0} has not committed")]
    NotCommitted(VoterId),

    #[error("groupballot validation: edge {0} does not exist")]
    UnknownEdge(Identifier),

    #[error("groupballot validation: no ciphertext from {0} to {1}")]
    NoSuchCiphertext(VoterId, VoterId),

    #[error("groupballot validation: callback for unknown oracle request {0}")]
    UnsolicitedCallback(Identifier),

    #[error("groupballot validation: voters {0} and {1} are not in the same group")]
    NotSameGroup(VoterId, VoterId),

    #[error("groupballot validation: seed not ready: {pending_reveals} pending reveals, admin revealed: {admin_revealed}, oracle value delivered: {oracle_delivered}")]
    SeedNotReady {
        pending_reveals: usize,
        admin_revealed: bool,
        oracle_delivered: bool,
    },

    #[error("groupballot validation: key exchange on edge {0} is incomplete")]
    ExchangeIncomplete(Identifier),

    #[error("groupballot validation: no completed key exchange between {0} and {1}")]
    NoSharedSecret(VoterId, VoterId),

    #[error("groupballot validation: {0} voters have not broadcast group totals")]
    TotalsNotReady(usize),

    #[error("groupballot validation: oracle budget of {0} requests is exhausted")]
    OracleUnderfunded(u32),

    #[error("groupballot validation: invalid group count {groups} for {voters} voters")]
    InvalidGroupCount { groups: usize, voters: usize },

    #[error("groupballot validation: voting options must be non-empty and unique")]
    InvalidVotingOptions,

    #[error("groupballot validation: expected oracle request index {expected}, found {found}")]
    InvalidRequestIndex { expected: u32, found: u32 },

    #[error("groupballot validation: oracle value is empty")]
    EmptyOracleValue,

    #[error("groupballot validation: voter {0} contributed a small-order point to edge {1}")]
    WeakKeyContribution(VoterId, Identifier),

    #[error("groupballot validation: a voter cannot pair with itself")]
    SelfEdge,

    #[error("groupballot validation: expected {expected} group totals, found {found}")]
    WrongTotalsLength { expected: usize, found: usize },

    #[error("groupballot validation: group totals sum to {sum}, more than the group size {group_size}")]
    TotalsExceedGroupSize { sum: u64, group_size: usize },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        use ValidationError::*;

        match self {
            AuthorityPublicKeyMismatch | OraclePublicKeyMismatch | NotEdgeParticipant(..) => {
                ErrorKind::Authorization
            }
            WrongPhase(_)
            | AlreadyRegistered(_)
            | AlreadyCommitted(_)
            | AlreadyRevealed(_)
            | AlreadyContributed(..)
            | AlreadySent(..)
            | AlreadyBroadcast(_)
            | DuplicateCallback(_)
            | OracleValueDelivered
            | DuplicateTransaction(_) => ErrorKind::PhaseViolation,
            HashMismatch | SeedMismatch | SignatureError(_) | WeakKeyContribution(..) => {
                ErrorKind::Integrity
            }
            TransactionNotFound(_)
            | MismatchedTransactionType
            | ElectionMismatch
            | NotRegistered(_)
            | NotCommitted(_)
            | UnknownEdge(_)
            | NoSuchCiphertext(..)
            | UnsolicitedCallback(_)
            | NotSameGroup(..) => ErrorKind::Referential,
            SeedNotReady { .. } | ExchangeIncomplete(_) | NoSharedSecret(..) | TotalsNotReady(_) => {
                ErrorKind::Readiness
            }
            OracleUnderfunded(_) => ErrorKind::ResourceExhaustion,
            InvalidGroupCount { .. }
            | InvalidVotingOptions
            | InvalidRequestIndex { .. }
            | EmptyOracleValue
            | SelfEdge
            | WrongTotalsLength { .. }
            | TotalsExceedGroupSize { .. } => ErrorKind::InvalidInput,
        }
    }

    /// Readiness failures clear up once the missing messages arrive.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Readiness
    }
}

use crate::*;
use content_inspector::ContentType;
use digest::Digest;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use ed25519_dalek::Verifier;
use num_enum::TryFromPrimitive;
use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::convert::AsRef;
use std::convert::From;
use std::convert::TryFrom;
use std::ops::Deref;
use std::str::FromStr;

// Generates the signed transaction enum, its dispatch methods and the conversions between each
// concrete transaction and the enum.
macro_rules! transactions {
    ($($variant:ident($tx:ty)),+ $(,)?) => {
        /// A signed transaction
        #[derive(Serialize, Deserialize, Clone, Debug)]
        #[serde(tag = "type")]
        #[serde(rename_all = "snake_case")]
        pub enum SignedTransaction {
            $($variant(Signed<$tx>)),+
        }

        impl SignedTransaction {
            /// Get the transaction type
            pub fn transaction_type(&self) -> TransactionType {
                match self {
                    $(SignedTransaction::$variant(_) => TransactionType::$variant),+
                }
            }

            /// Get the transaction ID
            pub fn id(&self) -> Identifier {
                match self {
                    $(SignedTransaction::$variant(signed) => signed.tx.id()),+
                }
            }

            /// Get the transactions this one depends on
            pub fn inputs(&self) -> Vec<Identifier> {
                match self {
                    $(SignedTransaction::$variant(signed) => signed.tx.inputs()),+
                }
            }

            /// Whether re-submitting this transaction resolves to the stored one
            pub fn is_idempotent(&self) -> bool {
                match self {
                    $(SignedTransaction::$variant(signed) => signed.tx.is_idempotent()),+
                }
            }

            pub fn verify_signature(&self) -> Result<(), ValidationError> {
                match self {
                    $(SignedTransaction::$variant(signed) => signed.verify_signature()),+
                }
            }

            pub fn validate<S: Store>(&self, s: &S) -> Result<(), ValidationError> {
                match self {
                    $(SignedTransaction::$variant(signed) => signed.validate(s)),+
                }
            }
        }

        $(
            impl From<Signed<$tx>> for SignedTransaction {
                fn from(tx: Signed<$tx>) -> Self {
                    SignedTransaction::$variant(tx)
                }
            }

            impl TryFrom<SignedTransaction> for Signed<$tx> {
                type Error = ValidationError;

                fn try_from(tx: SignedTransaction) -> Result<Self, Self::Error> {
                    match tx {
                        SignedTransaction::$variant(tx) => Ok(tx),
                        _ => Err(ValidationError::MismatchedTransactionType),
                    }
                }
            }
        )+
    };
}

transactions! {
    Election(ElectionTransaction),
    Registration(RegistrationTransaction),
    CommitPhase(CommitPhaseTransaction),
    Commitment(CommitmentTransaction),
    RevealPhase(RevealPhaseTransaction),
    Reveal(RevealTransaction),
    OracleRequest(OracleRequestTransaction),
    OracleResponse(OracleResponseTransaction),
    Distribution(DistributionTransaction),
    Edge(EdgeTransaction),
    KeyContribution(KeyContributionTransaction),
    EncryptedVote(EncryptedVoteTransaction),
    GroupTotal(GroupTotalTransaction),
}

impl SignedTransaction {
    /// Pack into bytes
    pub fn as_bytes(&self) -> Vec<u8> {
        serde_cbor::to_vec(self).expect("groupballot: Unexpected error packing transaction")
    }

    /// Unpack from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match content_inspector::inspect(bytes) {
            ContentType::UTF_8 if std::str::from_utf8(bytes).is_ok() => {
                Ok(serde_json::from_slice(bytes)?)
            }
            ContentType::UTF_8 | ContentType::BINARY => Ok(serde_cbor::from_slice(bytes)?),
            _ => Err(Error::DeserializationUnknownFormat),
        }
    }

    /// The notification subscribers see when this transaction is applied, if any
    pub fn event(&self) -> Option<Event> {
        match self {
            SignedTransaction::Registration(signed) => Some(Event::VoterRegistered {
                election: signed.election,
                voter: signed.voter_id(),
            }),
            SignedTransaction::CommitPhase(signed) => Some(Event::PhaseChanged {
                election: signed.election,
                phase: ElectionPhase::Commit,
            }),
            SignedTransaction::RevealPhase(signed) => Some(Event::PhaseChanged {
                election: signed.election,
                phase: ElectionPhase::Reveal,
            }),
            SignedTransaction::Distribution(signed) => Some(Event::PhaseChanged {
                election: signed.election,
                phase: ElectionPhase::Distributed,
            }),
            SignedTransaction::OracleRequest(signed) => Some(Event::OracleQuerySent {
                election: signed.election,
                request: signed.id,
                description: ORACLE_QUERY_DESCRIPTION.to_owned(),
            }),
            SignedTransaction::OracleResponse(signed) => Some(Event::OracleValueReceived {
                election: signed.election,
                request: signed.request,
                value: signed.value.clone(),
            }),
            _ => None,
        }
    }
}

/// This trait should be considered sealed and should not be implemented outside this crate
#[doc(hidden)]
pub trait Signable: Serialize {
    fn id(&self) -> Identifier;
    fn public(&self) -> Option<PublicKey>;
    fn inputs(&self) -> Vec<Identifier>;
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError>;

    fn is_idempotent(&self) -> bool {
        false
    }

    fn as_bytes(&self) -> Vec<u8> {
        serde_cbor::to_vec(&self).expect("groupballot: Unexpected error serializing transaction")
    }
}

/// A generic signed transaction
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Signed<T: Signable + Serialize> {
    pub tx: T,

    #[serde(with = "EdSignatureHex")]
    pub sig: Signature,
}

impl<T: Signable + Serialize> Signed<T> {
    /// Sign a transaction, producing a Signed<T>
    pub fn sign(secret: &SecretKey, transaction: T) -> Result<Self, Error> {
        let public_key = PublicKey::from(secret);
        if let Some(tx_public) = transaction.public() {
            if public_key != tx_public {
                return Err(Error::MismatchedPublicKeys);
            }
        }

        let serialized = transaction.as_bytes();

        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&serialized, &public_key);

        Ok(Signed {
            tx: transaction,
            sig: signature,
        })
    }

    /// Verify the signature on a signed transaction
    pub fn verify_signature(&self) -> Result<(), ValidationError> {
        let serialized = self.tx.as_bytes();

        if let Some(tx_public) = self.tx.public() {
            Ok(tx_public.verify(&serialized, &self.sig)?)
        } else {
            Ok(())
        }
    }

    /// Get the inner unsigned transaction
    pub fn inner(&self) -> &T {
        &self.tx
    }

    /// Get the transaction ID
    pub fn id(&self) -> Identifier {
        self.tx.id()
    }

    /// Verify the signature and validate the transaction
    pub fn validate<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        self.verify_signature()?;
        self.validate_tx(store)?;

        Ok(())
    }
}

impl<T: Signable + Serialize> AsRef<T> for Signed<T> {
    fn as_ref(&self) -> &T {
        &self.tx
    }
}

impl<T: Signable + Serialize> Deref for Signed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

/// Transaction identifier
///
/// The identifier defines the election, transaction-type, and a unique identifier. Identifiers
/// of records that must exist at most once (one registration per voter, one edge per unordered
/// pair, one ciphertext per direction) are derived from the record's natural key, so a second
/// submission collides with the first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    pub election_id: [u8; 15],
    pub transaction_type: TransactionType,
    pub unique_id: [u8; 16],
}

impl Identifier {
    /// Create a new Identifier
    pub fn new(election_id: Identifier, transaction_type: TransactionType, unique_info: &[u8]) -> Self {
        let mut unique_id = [0; 16];
        unique_id.copy_from_slice(&sha2::Sha512::digest(unique_info)[0..16]);
        Identifier {
            election_id: election_id.election_id,
            transaction_type,
            unique_id,
        }
    }

    /// Create an identifier for a transaction that occurs once per election
    pub fn singleton(election_id: Identifier, transaction_type: TransactionType) -> Self {
        Identifier {
            election_id: election_id.election_id,
            transaction_type,
            unique_id: [0; 16],
        }
    }

    /// Create a new identifier for an election
    pub fn new_for_election() -> Self {
        let mut csprng = rand::rngs::OsRng {};

        let election_id: [u8; 15] = csprng.gen();
        Identifier {
            election_id,
            transaction_type: TransactionType::Election,
            unique_id: [0; 16],
        }
    }

    /// The identifier of the election this identifier belongs to
    pub fn election(&self) -> Identifier {
        Identifier::singleton(*self, TransactionType::Election)
    }

    pub fn to_array(&self) -> [u8; 32] {
        let mut bytes: [u8; 32] = [0; 32];
        bytes[0..15].clone_from_slice(&self.election_id);
        bytes[15] = self.transaction_type as u8;
        bytes[16..32].clone_from_slice(&self.unique_id);
        bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_array().to_vec()
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| Error::IdentifierBadHex)?;

        if bytes.len() != 32 {
            return Err(Error::IdentifierBadLen);
        }

        let mut election_id = [0; 15];
        election_id.copy_from_slice(&bytes[0..15]);
        let transaction_type = TransactionType::try_from_primitive(bytes[15])
            .map_err(|_| Error::IdentifierBadType(bytes[15]))?;
        let mut unique_id = [0; 16];
        unique_id.copy_from_slice(&bytes[16..]);

        Ok(Identifier {
            election_id,
            transaction_type,
            unique_id,
        })
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        std::str::FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl From<Identifier> for [u8; 32] {
    fn from(item: Identifier) -> Self {
        item.to_array()
    }
}

/// A transaction type
#[derive(
    Serialize, Deserialize, TryFromPrimitive, Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionType {
    Election = 1,
    Registration = 2,
    CommitPhase = 3,
    Commitment = 4,
    RevealPhase = 5,
    Reveal = 6,
    OracleRequest = 7,
    OracleResponse = 8,
    Distribution = 9,
    Edge = 10,
    KeyContribution = 11,
    EncryptedVote = 12,
    GroupTotal = 13,
}

impl TransactionType {
    pub fn name(&self) -> &'static str {
        match self {
            TransactionType::Election => "election",
            TransactionType::Registration => "registration",
            TransactionType::CommitPhase => "commit_phase",
            TransactionType::Commitment => "commitment",
            TransactionType::RevealPhase => "reveal_phase",
            TransactionType::Reveal => "reveal",
            TransactionType::OracleRequest => "oracle_request",
            TransactionType::OracleResponse => "oracle_response",
            TransactionType::Distribution => "distribution",
            TransactionType::Edge => "edge",
            TransactionType::KeyContribution => "key_contribution",
            TransactionType::EncryptedVote => "encrypted_vote",
            TransactionType::GroupTotal => "group_total",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

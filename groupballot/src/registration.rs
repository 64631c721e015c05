use crate::*;
use ed25519_dalek::PublicKey;
use indexmap::IndexSet;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::convert::TryFrom;
use std::str::FromStr;

/// A voter's identity: the ed25519 public key that signs the voter's transactions.
///
/// Ordered by its bytes, which gives every unordered pair of voters a canonical order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoterId(pub [u8; 32]);

impl VoterId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_public_key(&self) -> Result<PublicKey, Error> {
        Ok(PublicKey::from_bytes(&self.0)?)
    }
}

impl From<&PublicKey> for VoterId {
    fn from(public: &PublicKey) -> Self {
        VoterId(public.to_bytes())
    }
}

impl From<PublicKey> for VoterId {
    fn from(public: PublicKey) -> Self {
        VoterId::from(&public)
    }
}

impl TryFrom<&[u8]> for VoterId {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 32 {
            return Err(Error::InvalidVoterId);
        }
        let mut id = [0; 32];
        id.copy_from_slice(bytes);
        Ok(VoterId(id))
    }
}

impl FromStr for VoterId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidVoterId)?;
        VoterId::try_from(bytes.as_slice())
    }
}

impl std::fmt::Display for VoterId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for VoterId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "VoterId({}..)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for VoterId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VoterId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        VoterId::from_str(&s).map_err(de::Error::custom)
    }
}

/// Transaction 2: Registration
///
/// A voter joins the election. Each identity can register once; the order of registrations on
/// the ledger is the voter's registration index.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistrationTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub voter: PublicKey,
}

impl RegistrationTransaction {
    pub fn new(election: Identifier, voter: PublicKey) -> Self {
        RegistrationTransaction {
            id: RegistrationTransaction::build_id(election, &VoterId::from(&voter)),
            election,
            voter,
        }
    }

    pub fn build_id(election: Identifier, voter: &VoterId) -> Identifier {
        Identifier::new(election, TransactionType::Registration, voter.as_bytes())
    }

    pub fn voter_id(&self) -> VoterId {
        VoterId::from(&self.voter)
    }
}

impl Signable for RegistrationTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.voter)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    /// Validate the transaction
    ///
    /// The validation does the following:
    ///  - Validates that the election is still accepting registrations
    ///  - Validates that this voter has not registered before
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.id != RegistrationTransaction::build_id(self.election, &self.voter_id()) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Registration {
            return Err(ValidationError::WrongPhase(phase));
        }

        if store.get_transaction(self.id).is_some() {
            return Err(ValidationError::AlreadyRegistered(self.voter_id()));
        }

        Ok(())
    }
}

/// The registered voters of an election, in registration order
#[derive(Clone, Debug, Default)]
pub struct VoterRegistry {
    voters: IndexSet<VoterId>,
}

impl VoterRegistry {
    /// Read the registry of an election from the ledger
    pub fn load<S: Store>(store: &S, election_id: Identifier) -> Result<Self, ValidationError> {
        store.get_election(election_id.election())?;

        let voters = store
            .get_multiple(election_id, TransactionType::Registration)
            .into_iter()
            .filter_map(|tx| match tx {
                SignedTransaction::Registration(signed) => Some(signed.voter_id()),
                _ => None,
            })
            .collect();

        Ok(VoterRegistry { voters })
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn contains(&self, voter: &VoterId) -> bool {
        self.voters.contains(voter)
    }

    /// Registration index of a voter
    pub fn index_of(&self, voter: &VoterId) -> Option<usize> {
        self.voters.get_index_of(voter)
    }

    /// Voter at a registration index
    pub fn get(&self, index: usize) -> Option<&VoterId> {
        self.voters.get_index(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoterId> {
        self.voters.iter()
    }

    pub fn to_vec(&self) -> Vec<VoterId> {
        self.voters.iter().copied().collect()
    }

    /// Fail with `NotRegistered` unless the voter is registered
    pub fn require(&self, voter: &VoterId) -> Result<usize, ValidationError> {
        self.index_of(voter)
            .ok_or(ValidationError::NotRegistered(*voter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_election(store: &mut MemStore) -> Identifier {
        let (authority_secret, authority_public) = generate_keypair();
        let (_, oracle_public) = generate_keypair();
        let mut election =
            ElectionTransaction::new(authority_public, OracleConfig::new(oracle_public, 1));
        election.set_voting_options(vec!["yes".into(), "no".into()]);
        let id = election.id;
        store
            .apply(Signed::sign(&authority_secret, election).unwrap().into())
            .unwrap();
        id
    }

    #[test]
    fn test_voter_id() {
        let (_, public) = generate_keypair();
        let id = VoterId::from(&public);

        assert_eq!(id.to_public_key().unwrap(), public);
        assert_eq!(VoterId::from_str(&id.to_string()).unwrap(), id);
        assert!(VoterId::from_str("abcd").is_err());

        let json = serde_json::to_string(&id).unwrap();
        let back: VoterId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_registration_is_unique() {
        let mut store = MemStore::default();
        let election_id = new_election(&mut store);

        let (secret, public) = generate_keypair();
        let tx = Signed::sign(&secret, RegistrationTransaction::new(election_id, public)).unwrap();
        store.apply(tx.clone().into()).unwrap();

        let registry = VoterRegistry::load(&store, election_id).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.index_of(&VoterId::from(&public)), Some(0));

        // Second registration of the same identity fails and changes nothing
        let again = Signed::sign(&secret, RegistrationTransaction::new(election_id, public)).unwrap();
        let err = store.apply(again.into()).unwrap_err();
        assert!(matches!(err, ValidationError::AlreadyRegistered(_)));
        assert_eq!(err.kind(), ErrorKind::PhaseViolation);

        let registry = VoterRegistry::load(&store, election_id).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_indices_follow_ledger_order() {
        let mut store = MemStore::default();
        let election_id = new_election(&mut store);

        let mut ids = Vec::new();
        for _ in 0..4 {
            let (secret, public) = generate_keypair();
            let tx = Signed::sign(&secret, RegistrationTransaction::new(election_id, public)).unwrap();
            store.apply(tx.into()).unwrap();
            ids.push(VoterId::from(&public));
        }

        let registry = VoterRegistry::load(&store, election_id).unwrap();
        for (index, id) in ids.iter().enumerate() {
            assert_eq!(registry.index_of(id), Some(index));
            assert_eq!(registry.get(index), Some(id));
        }
        assert_eq!(registry.to_vec(), ids);

        let (_, stranger) = generate_keypair();
        assert!(matches!(
            registry.require(&VoterId::from(&stranger)),
            Err(ValidationError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_registration_closes_with_commit_phase() {
        let mut store = MemStore::default();
        let (authority_secret, authority_public) = generate_keypair();
        let (_, oracle_public) = generate_keypair();
        let mut election =
            ElectionTransaction::new(authority_public, OracleConfig::new(oracle_public, 1));
        election.set_voting_options(vec!["yes".into()]);
        let election_id = election.id;
        store
            .apply(Signed::sign(&authority_secret, election).unwrap().into())
            .unwrap();

        let commit_phase =
            CommitPhaseTransaction::new(election_id, authority_public, commitment_hash(b"seed"));
        store
            .apply(Signed::sign(&authority_secret, commit_phase).unwrap().into())
            .unwrap();

        let (secret, public) = generate_keypair();
        let late = Signed::sign(&secret, RegistrationTransaction::new(election_id, public)).unwrap();
        assert!(matches!(
            store.apply(late.into()),
            Err(ValidationError::WrongPhase(ElectionPhase::Commit))
        ));
    }
}

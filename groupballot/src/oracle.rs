use crate::*;
use ed25519_dalek::{PublicKey, SecretKey};

/// Description carried by the event emitted when an oracle request is posted
pub const ORACLE_QUERY_DESCRIPTION: &str = "oracle query was sent, standing by for the answer...";

/// Transaction 7: OracleRequest
///
/// The election authority asks the external oracle for a random value. Requests are numbered
/// from zero and limited by the election's prepaid budget.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OracleRequestTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub authority_public: PublicKey,

    pub request_index: u32,
}

impl OracleRequestTransaction {
    pub fn new(election: Identifier, authority_public: PublicKey, request_index: u32) -> Self {
        OracleRequestTransaction {
            id: OracleRequestTransaction::build_id(election, request_index),
            election,
            authority_public,
            request_index,
        }
    }

    pub fn build_id(election: Identifier, request_index: u32) -> Identifier {
        Identifier::new(
            election,
            TransactionType::OracleRequest,
            &request_index.to_be_bytes(),
        )
    }
}

impl Signable for OracleRequestTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.authority_public)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    /// Validate the transaction
    ///
    /// The validation does the following:
    ///  - Validates that it is signed by the election authority
    ///  - Validates that the beacon is collecting contributions (commit or reveal phase)
    ///  - Validates that no oracle value has been delivered yet
    ///  - Validates that the prepaid budget covers another request
    ///  - Validates that requests are numbered consecutively
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.id != OracleRequestTransaction::build_id(self.election, self.request_index) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let election = check_authority(store, self.election, &self.authority_public)?;

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Commit && phase != ElectionPhase::Reveal {
            return Err(ValidationError::WrongPhase(phase));
        }

        if !store
            .get_multiple(self.election, TransactionType::OracleResponse)
            .is_empty()
        {
            return Err(ValidationError::OracleValueDelivered);
        }

        let issued = store
            .get_multiple(self.election, TransactionType::OracleRequest)
            .len() as u32;
        if issued >= election.oracle.prepaid_requests {
            return Err(ValidationError::OracleUnderfunded(
                election.oracle.prepaid_requests,
            ));
        }
        if self.request_index != issued {
            return Err(ValidationError::InvalidRequestIndex {
                expected: issued,
                found: self.request_index,
            });
        }

        Ok(())
    }
}

/// Transaction 8: OracleResponse
///
/// The oracle's callback delivering the random value for a request. Only the first response
/// of an election counts.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OracleResponseTransaction {
    pub id: Identifier,
    pub election: Identifier,
    pub request: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub oracle_public: PublicKey,

    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

impl OracleResponseTransaction {
    pub fn new(request: Identifier, oracle_public: PublicKey, value: Vec<u8>) -> Self {
        OracleResponseTransaction {
            id: OracleResponseTransaction::build_id(request),
            election: request.election(),
            request,
            oracle_public,
            value,
        }
    }

    pub fn build_id(request: Identifier) -> Identifier {
        Identifier::new(
            request.election(),
            TransactionType::OracleResponse,
            &request.to_bytes(),
        )
    }
}

impl Signable for OracleResponseTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.oracle_public)
    }

    // An unknown request is reported as UnsolicitedCallback, not as a missing input
    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.id != OracleResponseTransaction::build_id(self.request) {
            return Err(ValidationError::MismatchedTransactionType);
        }
        if self.request.election() != self.election {
            return Err(ValidationError::ElectionMismatch);
        }

        let election = store.get_election(self.election)?;
        if election.oracle.public_key != self.oracle_public {
            return Err(ValidationError::OraclePublicKeyMismatch);
        }

        if store.get_oracle_request(self.request).is_err() {
            return Err(ValidationError::UnsolicitedCallback(self.request));
        }

        if !store
            .get_multiple(self.election, TransactionType::OracleResponse)
            .is_empty()
        {
            return Err(ValidationError::DuplicateCallback(self.request));
        }

        if self.value.is_empty() {
            return Err(ValidationError::EmptyOracleValue);
        }

        Ok(())
    }
}

/// An in-process stand-in for the external randomness oracle
pub struct LocalOracle {
    secret: SecretKey,
    public: PublicKey,
}

impl LocalOracle {
    pub fn new() -> Self {
        let (secret, public) = generate_keypair();
        LocalOracle { secret, public }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Answer a request with 32 fresh random bytes
    pub fn answer(
        &self,
        request: &Signed<OracleRequestTransaction>,
    ) -> Result<Signed<OracleResponseTransaction>, Error> {
        let response =
            OracleResponseTransaction::new(request.id, self.public, random_bytes().to_vec());
        Signed::sign(&self.secret, response)
    }
}

impl Default for LocalOracle {
    fn default() -> Self {
        LocalOracle::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn election_in_commit_phase(
        prepaid: u32,
    ) -> (MemStore, Identifier, SecretKey, PublicKey, LocalOracle) {
        let mut store = MemStore::default();
        let (authority_secret, authority_public) = generate_keypair();
        let oracle = LocalOracle::new();

        let mut election = ElectionTransaction::new(
            authority_public,
            OracleConfig::new(oracle.public_key(), prepaid),
        );
        election.set_voting_options(vec!["yes".into(), "no".into()]);
        let election_id = election.id;
        store
            .apply(Signed::sign(&authority_secret, election).unwrap().into())
            .unwrap();

        let commit_phase =
            CommitPhaseTransaction::new(election_id, authority_public, commitment_hash(b"admin"));
        store
            .apply(Signed::sign(&authority_secret, commit_phase).unwrap().into())
            .unwrap();

        (store, election_id, authority_secret, authority_public, oracle)
    }

    #[test]
    fn test_oracle_round_trip() {
        let (mut store, election_id, authority_secret, authority_public, oracle) =
            election_in_commit_phase(1);
        store.drain_events();

        let request = OracleRequestTransaction::new(election_id, authority_public, 0);
        let request = Signed::sign(&authority_secret, request).unwrap();
        store.apply(request.clone().into()).unwrap();

        let events = store.drain_events();
        assert_eq!(
            events,
            vec![Event::OracleQuerySent {
                election: election_id,
                request: request.id,
                description: ORACLE_QUERY_DESCRIPTION.to_owned(),
            }]
        );

        let response = oracle.answer(&request).unwrap();
        let value = response.value.clone();
        store.apply(response.clone().into()).unwrap();

        let events = store.drain_events();
        assert_eq!(
            events,
            vec![Event::OracleValueReceived {
                election: election_id,
                request: request.id,
                value,
            }]
        );

        // A second callback for the same request is a duplicate
        let again = oracle.answer(&request).unwrap();
        assert!(matches!(
            store.apply(again.into()),
            Err(ValidationError::DuplicateCallback(_))
        ));

        // Once the value is in, there is nothing left to ask for
        let request = OracleRequestTransaction::new(election_id, authority_public, 1);
        let request = Signed::sign(&authority_secret, request).unwrap();
        assert!(matches!(
            store.apply(request.into()),
            Err(ValidationError::OracleValueDelivered)
        ));
    }

    #[test]
    fn test_unsolicited_callback() {
        let (mut store, election_id, _, authority_public, oracle) = election_in_commit_phase(1);

        // A request that was never posted
        let request = OracleRequestTransaction::new(election_id, authority_public, 0);
        let response = OracleResponseTransaction::new(request.id, oracle.public_key(), vec![7; 32]);
        let response = Signed::sign(&oracle.secret, response).unwrap();
        let err = store.apply(response.into()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsolicitedCallback(_)));
        assert_eq!(err.kind(), ErrorKind::Referential);
    }

    #[test]
    fn test_callback_from_wrong_oracle() {
        let (mut store, election_id, authority_secret, authority_public, _) =
            election_in_commit_phase(1);

        let request = OracleRequestTransaction::new(election_id, authority_public, 0);
        let request = Signed::sign(&authority_secret, request).unwrap();
        store.apply(request.clone().into()).unwrap();

        let impostor = LocalOracle::new();
        assert!(matches!(
            store.apply(impostor.answer(&request).unwrap().into()),
            Err(ValidationError::OraclePublicKeyMismatch)
        ));
    }

    #[test]
    fn test_oracle_budget() {
        let (mut store, election_id, authority_secret, authority_public, _) =
            election_in_commit_phase(1);

        let first = OracleRequestTransaction::new(election_id, authority_public, 0);
        store
            .apply(Signed::sign(&authority_secret, first).unwrap().into())
            .unwrap();

        // The oracle has not answered yet, but the budget is spent
        let second = OracleRequestTransaction::new(election_id, authority_public, 1);
        let err = store
            .apply(Signed::sign(&authority_secret, second).unwrap().into())
            .unwrap_err();
        assert!(matches!(err, ValidationError::OracleUnderfunded(1)));
        assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
        assert_eq!(
            store
                .get_multiple(election_id, TransactionType::OracleRequest)
                .len(),
            1
        );
    }

    #[test]
    fn test_request_numbering_and_phase() {
        let (mut store, election_id, authority_secret, authority_public, _) =
            election_in_commit_phase(3);

        let skipped = OracleRequestTransaction::new(election_id, authority_public, 2);
        assert!(matches!(
            store.apply(Signed::sign(&authority_secret, skipped).unwrap().into()),
            Err(ValidationError::InvalidRequestIndex {
                expected: 0,
                found: 2
            })
        ));

        // Only the authority asks the oracle
        let (other_secret, other_public) = generate_keypair();
        let request = OracleRequestTransaction::new(election_id, other_public, 0);
        assert!(matches!(
            store.apply(Signed::sign(&other_secret, request).unwrap().into()),
            Err(ValidationError::AuthorityPublicKeyMismatch)
        ));

        // Not before the commit phase
        let mut fresh = MemStore::default();
        let (secret, public) = generate_keypair();
        let mut election =
            ElectionTransaction::new(public, OracleConfig::new(generate_keypair().1, 1));
        election.set_voting_options(vec!["a".into()]);
        let fresh_id = election.id;
        fresh
            .apply(Signed::sign(&secret, election).unwrap().into())
            .unwrap();

        let early = OracleRequestTransaction::new(fresh_id, public, 0);
        assert!(matches!(
            fresh.apply(Signed::sign(&secret, early).unwrap().into()),
            Err(ValidationError::WrongPhase(ElectionPhase::Registration))
        ));
    }
}

use crate::*;
use ed25519_dalek::PublicKey;
use log::debug;
use sha2::{Digest, Sha256};

/// The shuffle seed produced by the randomness beacon
pub type Seed = [u8; 32];

const SEED_DOMAIN: &[u8] = b"groupballot-seed-v1";

/// Transaction 3: CommitPhase
///
/// The election authority closes registration and commits to its own beacon contribution.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommitPhaseTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub authority_public: PublicKey,

    /// SHA-256 of the authority's seed
    #[serde(with = "hex::serde")]
    pub seed_hash: [u8; 32],
}

impl CommitPhaseTransaction {
    pub fn new(election: Identifier, authority_public: PublicKey, seed_hash: [u8; 32]) -> Self {
        CommitPhaseTransaction {
            id: CommitPhaseTransaction::build_id(election),
            election,
            authority_public,
            seed_hash,
        }
    }

    pub fn build_id(election: Identifier) -> Identifier {
        Identifier::singleton(election, TransactionType::CommitPhase)
    }
}

impl Signable for CommitPhaseTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.authority_public)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.id != CommitPhaseTransaction::build_id(self.election) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        check_authority(store, self.election, &self.authority_public)?;

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Registration {
            return Err(ValidationError::WrongPhase(phase));
        }

        Ok(())
    }
}

/// Transaction 4: Commitment
///
/// A registered voter commits to its beacon contribution.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommitmentTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub voter: PublicKey,

    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
}

impl CommitmentTransaction {
    pub fn new(election: Identifier, voter: PublicKey, hash: [u8; 32]) -> Self {
        CommitmentTransaction {
            id: CommitmentTransaction::build_id(election, &VoterId::from(&voter)),
            election,
            voter,
            hash,
        }
    }

    pub fn build_id(election: Identifier, voter: &VoterId) -> Identifier {
        Identifier::new(election, TransactionType::Commitment, voter.as_bytes())
    }

    pub fn voter_id(&self) -> VoterId {
        VoterId::from(&self.voter)
    }
}

impl Signable for CommitmentTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.voter)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        let voter = self.voter_id();
        if self.id != CommitmentTransaction::build_id(self.election, &voter) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Commit {
            return Err(ValidationError::WrongPhase(phase));
        }

        store
            .get_registration(RegistrationTransaction::build_id(self.election, &voter))
            .map_err(|_| ValidationError::NotRegistered(voter))?;

        let mut beacon = RandomnessBeacon::load(store, self.election)?;
        beacon.round.commit(voter, self.hash)
    }
}

/// Transaction 5: RevealPhase
///
/// The election authority closes the commit phase by revealing its own seed.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RevealPhaseTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub authority_public: PublicKey,

    #[serde(with = "hex::serde")]
    pub seed: Vec<u8>,
}

impl RevealPhaseTransaction {
    pub fn new(election: Identifier, authority_public: PublicKey, seed: Vec<u8>) -> Self {
        RevealPhaseTransaction {
            id: RevealPhaseTransaction::build_id(election),
            election,
            authority_public,
            seed,
        }
    }

    pub fn build_id(election: Identifier) -> Identifier {
        Identifier::singleton(election, TransactionType::RevealPhase)
    }
}

impl Signable for RevealPhaseTransaction {
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
    ///  - Validates that the election is in the commit phase
    ///  - Validates that the seed matches the hash committed when the commit phase started
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.id != RevealPhaseTransaction::build_id(self.election) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        check_authority(store, self.election, &self.authority_public)?;

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Commit {
            return Err(ValidationError::WrongPhase(phase));
        }

        let commit_phase = store.get_commit_phase(CommitPhaseTransaction::build_id(self.election))?;
        if commitment_hash(&self.seed) != commit_phase.seed_hash {
            return Err(ValidationError::HashMismatch);
        }

        Ok(())
    }
}

/// Transaction 6: Reveal
///
/// A voter reveals the value behind its commitment.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RevealTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub voter: PublicKey,

    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

impl RevealTransaction {
    pub fn new(election: Identifier, voter: PublicKey, value: Vec<u8>) -> Self {
        RevealTransaction {
            id: RevealTransaction::build_id(election, &VoterId::from(&voter)),
            election,
            voter,
            value,
        }
    }

    pub fn build_id(election: Identifier, voter: &VoterId) -> Identifier {
        Identifier::new(election, TransactionType::Reveal, voter.as_bytes())
    }

    pub fn voter_id(&self) -> VoterId {
        VoterId::from(&self.voter)
    }
}

impl Signable for RevealTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.voter)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        let voter = self.voter_id();
        if self.id != RevealTransaction::build_id(self.election, &voter) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Reveal {
            return Err(ValidationError::WrongPhase(phase));
        }

        let mut beacon = RandomnessBeacon::load(store, self.election)?;
        beacon.round.reveal(voter, &self.value)
    }
}

/// The randomness beacon of an election, as read from the ledger.
///
/// Combines the authority's seed, the voters' reveals and the oracle value into the shuffle seed.
/// The seed can only be read once every contribution is present.
#[derive(Clone, Debug)]
pub struct RandomnessBeacon {
    election: Identifier,
    admin_hash: Option<[u8; 32]>,
    admin_seed: Option<Vec<u8>>,
    round: CommitRevealRound,
    oracle_value: Option<Vec<u8>>,
    registry: VoterRegistry,
}

impl RandomnessBeacon {
    /// Replay the beacon's transactions from the ledger
    pub fn load<S: Store>(store: &S, election_id: Identifier) -> Result<Self, ValidationError> {
        let election = election_id.election();
        let registry = VoterRegistry::load(store, election)?;

        let admin_hash = store
            .get_commit_phase(CommitPhaseTransaction::build_id(election))
            .ok()
            .map(|tx| tx.seed_hash);
        let admin_seed = store
            .get_reveal_phase(RevealPhaseTransaction::build_id(election))
            .ok()
            .map(|tx| tx.seed.clone());

        let mut round = CommitRevealRound::new();
        for tx in store.get_multiple(election, TransactionType::Commitment) {
            if let SignedTransaction::Commitment(commitment) = tx {
                round.commit(commitment.voter_id(), commitment.hash)?;
            }
        }

        if admin_seed.is_some() {
            round.start_reveal();
            for tx in store.get_multiple(election, TransactionType::Reveal) {
                if let SignedTransaction::Reveal(reveal) = tx {
                    round.reveal(reveal.voter_id(), &reveal.value)?;
                }
            }
        }

        let oracle_value = store
            .get_multiple(election, TransactionType::OracleResponse)
            .into_iter()
            .find_map(|tx| match tx {
                SignedTransaction::OracleResponse(response) => Some(response.value.clone()),
                _ => None,
            });

        Ok(RandomnessBeacon {
            election,
            admin_hash,
            admin_seed,
            round,
            oracle_value,
            registry,
        })
    }

    /// The authority's committed seed hash, once the commit phase started
    pub fn admin_commitment(&self) -> Option<&[u8; 32]> {
        self.admin_hash.as_ref()
    }

    /// The authority's revealed seed, once the reveal phase started
    pub fn admin_seed(&self) -> Option<&[u8]> {
        self.admin_seed.as_deref()
    }

    pub fn admin_revealed(&self) -> bool {
        self.admin_seed.is_some()
    }

    /// The voters' commit-reveal round
    pub fn round(&self) -> &CommitRevealRound {
        &self.round
    }

    pub fn oracle_value(&self) -> Option<&[u8]> {
        self.oracle_value.as_deref()
    }

    /// Voters who committed and have not revealed yet
    pub fn pending_reveals(&self) -> Vec<VoterId> {
        self.round.pending_reveals()
    }

    pub fn is_ready(&self) -> bool {
        self.admin_revealed() && self.oracle_value.is_some() && self.round.is_complete()
    }

    /// The finalized seed.
    ///
    /// Fails with the retryable `SeedNotReady` while a reveal or the oracle value is missing.
    pub fn seed(&self) -> Result<Seed, ValidationError> {
        let (admin_seed, oracle_value) = match (&self.admin_seed, &self.oracle_value) {
            (Some(admin_seed), Some(oracle_value)) if self.round.is_complete() => {
                (admin_seed, oracle_value)
            }
            _ => {
                return Err(ValidationError::SeedNotReady {
                    pending_reveals: self.round.pending_reveals().len(),
                    admin_revealed: self.admin_revealed(),
                    oracle_delivered: self.oracle_value.is_some(),
                })
            }
        };

        let contributions: Vec<(VoterId, &[u8])> = self
            .registry
            .iter()
            .filter_map(|voter| {
                self.round
                    .get(voter)
                    .and_then(|c| c.revealed.as_deref())
                    .map(|revealed| (*voter, revealed))
            })
            .collect();

        debug!(
            "seed for election {} combined from {} voter reveals",
            self.election,
            contributions.len()
        );
        Ok(combine_seed(
            self.election,
            admin_seed,
            &contributions,
            oracle_value,
        ))
    }
}

/// Fold the beacon inputs into a seed.
///
/// Voter contributions must be given in registration order. Every variable-length input is
/// length-prefixed so no two input sets hash the same bytes.
pub fn combine_seed(
    election: Identifier,
    admin_seed: &[u8],
    contributions: &[(VoterId, &[u8])],
    oracle_value: &[u8],
) -> Seed {
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(&election.election_id);
    hasher.update(&length_prefixed(admin_seed));
    for (voter, revealed) in contributions {
        hasher.update(voter.as_bytes());
        hasher.update(&length_prefixed(revealed));
    }
    hasher.update(&length_prefixed(oracle_value));

    let mut seed = [0; 32];
    seed.copy_from_slice(&hasher.finalize());
    seed
}

fn length_prefixed(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + value.len());
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Setup {
        store: MemStore,
        election_id: Identifier,
        authority_secret: ed25519_dalek::SecretKey,
        authority_public: PublicKey,
        oracle: LocalOracle,
        voters: Vec<(ed25519_dalek::SecretKey, PublicKey)>,
    }

    fn setup(voters: usize) -> Setup {
        let mut store = MemStore::default();
        let (authority_secret, authority_public) = generate_keypair();
        let oracle = LocalOracle::new();

        let mut election =
            ElectionTransaction::new(authority_public, OracleConfig::new(oracle.public_key(), 1));
        election.set_voting_options(vec!["yes".into(), "no".into()]);
        let election_id = election.id;
        store
            .apply(Signed::sign(&authority_secret, election).unwrap().into())
            .unwrap();

        let voters: Vec<_> = (0..voters).map(|_| generate_keypair()).collect();
        for (secret, public) in &voters {
            let tx = RegistrationTransaction::new(election_id, *public);
            store.apply(Signed::sign(secret, tx).unwrap().into()).unwrap();
        }

        Setup {
            store,
            election_id,
            authority_secret,
            authority_public,
            oracle,
            voters,
        }
    }

    impl Setup {
        fn start_commit(&mut self, admin_seed: &[u8]) {
            let tx = CommitPhaseTransaction::new(
                self.election_id,
                self.authority_public,
                commitment_hash(admin_seed),
            );
            self.store
                .apply(Signed::sign(&self.authority_secret, tx).unwrap().into())
                .unwrap();
        }

        fn commit(&mut self, voter: usize, value: &[u8]) -> Result<Identifier, ValidationError> {
            let (secret, public) = &self.voters[voter];
            let tx = CommitmentTransaction::new(self.election_id, *public, commitment_hash(value));
            self.store.apply(Signed::sign(secret, tx).unwrap().into())
        }

        fn start_reveal(&mut self, admin_seed: &[u8]) -> Result<Identifier, ValidationError> {
            let tx = RevealPhaseTransaction::new(
                self.election_id,
                self.authority_public,
                admin_seed.to_vec(),
            );
            self.store
                .apply(Signed::sign(&self.authority_secret, tx).unwrap().into())
        }

        fn reveal(&mut self, voter: usize, value: &[u8]) -> Result<Identifier, ValidationError> {
            let (secret, public) = &self.voters[voter];
            let tx = RevealTransaction::new(self.election_id, *public, value.to_vec());
            self.store.apply(Signed::sign(secret, tx).unwrap().into())
        }

        fn oracle_round_trip(&mut self) {
            let request =
                OracleRequestTransaction::new(self.election_id, self.authority_public, 0);
            let request = Signed::sign(&self.authority_secret, request).unwrap();
            self.store.apply(request.clone().into()).unwrap();
            let response = self.oracle.answer(&request).unwrap();
            self.store.apply(response.into()).unwrap();
        }
    }

    #[test]
    fn test_seed_finalization() {
        let mut s = setup(3);
        s.start_commit(b"admin seed");
        for i in 0..3 {
            s.commit(i, &[i as u8; 8]).unwrap();
        }

        // Commit twice
        assert!(matches!(
            s.commit(0, b"again"),
            Err(ValidationError::AlreadyCommitted(_))
        ));

        // Wrong admin seed
        assert!(matches!(
            s.start_reveal(b"not the admin seed"),
            Err(ValidationError::HashMismatch)
        ));
        s.start_reveal(b"admin seed").unwrap();
        s.oracle_round_trip();

        let beacon = RandomnessBeacon::load(&s.store, s.election_id).unwrap();
        assert_eq!(beacon.pending_reveals().len(), 3);
        match beacon.seed() {
            Err(ValidationError::SeedNotReady {
                pending_reveals,
                admin_revealed,
                oracle_delivered,
            }) => {
                assert_eq!(pending_reveals, 3);
                assert!(admin_revealed);
                assert!(oracle_delivered);
            }
            other => panic!("unexpected {:?}", other),
        }

        s.reveal(0, &[0; 8]).unwrap();
        assert!(matches!(
            s.reveal(1, &[0; 8]),
            Err(ValidationError::HashMismatch)
        ));
        s.reveal(1, &[1; 8]).unwrap();

        let beacon = RandomnessBeacon::load(&s.store, s.election_id).unwrap();
        assert_eq!(beacon.pending_reveals(), vec![VoterId::from(&s.voters[2].1)]);
        let err = beacon.seed().unwrap_err();
        assert!(err.is_retryable());

        s.reveal(2, &[2; 8]).unwrap();
        let beacon = RandomnessBeacon::load(&s.store, s.election_id).unwrap();
        assert!(beacon.is_ready());
        let seed = beacon.seed().unwrap();

        // Reading it again gives the same seed
        let again = RandomnessBeacon::load(&s.store, s.election_id).unwrap();
        assert_eq!(again.seed().unwrap(), seed);
        assert_eq!(again.admin_seed(), Some(&b"admin seed"[..]));
        assert_eq!(again.admin_commitment(), Some(&commitment_hash(b"admin seed")));
    }

    #[test]
    fn test_seed_depends_on_every_input() {
        let election = Identifier::new_for_election();
        let a = VoterId([1; 32]);
        let b = VoterId([2; 32]);
        let one: &[u8] = b"one";
        let two: &[u8] = b"two";

        let base = combine_seed(election, b"admin", &[(a, one), (b, two)], b"oracle");
        assert_eq!(
            base,
            combine_seed(election, b"admin", &[(a, one), (b, two)], b"oracle")
        );

        let variants = vec![
            combine_seed(election, b"other", &[(a, one), (b, two)], b"oracle"),
            combine_seed(election, b"admin", &[(a, one), (b, &b"TWO"[..])], b"oracle"),
            combine_seed(election, b"admin", &[(b, two), (a, one)], b"oracle"),
            combine_seed(election, b"admin", &[(a, one), (b, two)], b"other"),
            combine_seed(election, b"admin", &[(a, one)], b"oracle"),
            // Moving a byte from one input into the next
            combine_seed(election, b"admi", &[(a, &b"none"[..]), (b, two)], b"oracle"),
            combine_seed(Identifier::new_for_election(), b"admin", &[(a, one), (b, two)], b"oracle"),
        ];
        for variant in variants {
            assert_ne!(base, variant);
        }
    }

    #[test]
    fn test_phase_gates() {
        let mut s = setup(1);

        // No commitments before the commit phase
        assert!(matches!(
            s.commit(0, b"early"),
            Err(ValidationError::WrongPhase(ElectionPhase::Registration))
        ));

        s.start_commit(b"admin");
        assert!(matches!(
            s.reveal(0, b"early"),
            Err(ValidationError::WrongPhase(ElectionPhase::Commit))
        ));

        // Strangers cannot commit
        let (stranger_secret, stranger_public) = generate_keypair();
        let tx = CommitmentTransaction::new(s.election_id, stranger_public, [0; 32]);
        assert!(matches!(
            s.store.apply(Signed::sign(&stranger_secret, tx).unwrap().into()),
            Err(ValidationError::NotRegistered(_))
        ));

        // Only the authority moves the phase forward
        let (other_secret, other_public) = generate_keypair();
        let tx = RevealPhaseTransaction::new(s.election_id, other_public, b"admin".to_vec());
        assert!(matches!(
            s.store.apply(Signed::sign(&other_secret, tx).unwrap().into()),
            Err(ValidationError::AuthorityPublicKeyMismatch)
        ));

        s.start_reveal(b"admin").unwrap();
        assert!(matches!(
            s.commit(0, b"late"),
            Err(ValidationError::WrongPhase(ElectionPhase::Reveal))
        ));
        assert!(matches!(
            s.reveal(0, b"never committed"),
            Err(ValidationError::NotCommitted(_))
        ));

        // With nobody committed, only the oracle value is missing
        let beacon = RandomnessBeacon::load(&s.store, s.election_id).unwrap();
        assert!(matches!(
            beacon.seed(),
            Err(ValidationError::SeedNotReady {
                pending_reveals: 0,
                admin_revealed: true,
                oracle_delivered: false
            })
        ));
    }
}

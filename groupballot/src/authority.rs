use crate::*;
use ed25519_dalek::{PublicKey, SecretKey};

/// The election authority: posts the election and moves it through its phases.
///
/// Holds the authority's signing key and its own beacon seed, which stays secret until the
/// reveal phase opens.
pub struct Authority {
    secret: SecretKey,
    public: PublicKey,
    election: Identifier,
    admin_seed: Vec<u8>,
}

impl Authority {
    /// Create a new election with the given voting options and oracle
    pub fn create_election(
        options: Vec<String>,
        oracle: OracleConfig,
    ) -> Result<(Self, Signed<ElectionTransaction>), Error> {
        let (secret, public) = generate_keypair();

        let mut election = ElectionTransaction::new(public, oracle);
        election.set_voting_options(options);
        let authority = Authority {
            secret,
            public,
            election: election.id,
            admin_seed: random_bytes().to_vec(),
        };
        let election = Signed::sign(&authority.secret, election)?;

        Ok((authority, election))
    }

    pub fn election_id(&self) -> Identifier {
        self.election
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Close registration and commit to the authority's seed
    pub fn start_commit_phase(&self) -> Result<Signed<CommitPhaseTransaction>, Error> {
        let tx = CommitPhaseTransaction::new(
            self.election,
            self.public,
            commitment_hash(&self.admin_seed),
        );
        Signed::sign(&self.secret, tx)
    }

    /// Close the commit phase by revealing the authority's seed
    pub fn start_reveal_phase(&self) -> Result<Signed<RevealPhaseTransaction>, Error> {
        let tx = RevealPhaseTransaction::new(self.election, self.public, self.admin_seed.clone());
        Signed::sign(&self.secret, tx)
    }

    /// Ask the oracle for its value, numbering the request after those already on the ledger
    pub fn request_random_number<S: Store>(
        &self,
        store: &S,
    ) -> Result<Signed<OracleRequestTransaction>, Error> {
        let index = store
            .get_multiple(self.election, TransactionType::OracleRequest)
            .len() as u32;
        let tx = OracleRequestTransaction::new(self.election, self.public, index);
        Signed::sign(&self.secret, tx)
    }

    /// Fix the groups using the finalized seed
    pub fn distribute<S: Store>(
        &self,
        store: &S,
        number_of_groups: u32,
    ) -> Result<Signed<DistributionTransaction>, Error> {
        let tx = DistributionTransaction::prepare(store, self.election, self.public, number_of_groups)?;
        Signed::sign(&self.secret, tx)
    }
}

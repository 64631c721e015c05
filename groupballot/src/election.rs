use crate::*;
use ed25519_dalek::PublicKey;
use std::collections::HashSet;

/// The external randomness oracle an election trusts
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OracleConfig {
    /// Key the oracle signs its responses with.
    #[serde(with = "EdPublicKeyHex")]
    pub public_key: PublicKey,

    /// Number of oracle requests the election has paid for up front.
    pub prepaid_requests: u32,
}

impl OracleConfig {
    pub fn new(public_key: PublicKey, prepaid_requests: u32) -> Self {
        OracleConfig {
            public_key,
            prepaid_requests,
        }
    }
}

/// Transaction 1: Election
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ElectionTransaction {
    pub id: Identifier,

    /// Election Authority Public Key
    ///
    /// The authority opens the commit and reveal phases, requests the oracle value and
    /// distributes voters into groups. It has no other privileges.
    #[serde(with = "EdPublicKeyHex")]
    pub authority_public: PublicKey,

    /// The options a voter can choose between. A vote is an index into this list.
    pub options: Vec<String>,

    /// The randomness oracle
    pub oracle: OracleConfig,
}

impl ElectionTransaction {
    /// Create a new ElectionTransaction
    pub fn new(authority_public: PublicKey, oracle: OracleConfig) -> Self {
        ElectionTransaction {
            id: Identifier::new_for_election(),
            authority_public,
            options: vec![],
            oracle,
        }
    }

    /// Declare the options voters choose between
    pub fn set_voting_options(&mut self, options: Vec<String>) {
        self.options = options;
    }

    pub fn num_options(&self) -> usize {
        self.options.len()
    }

    /// Get the index of an option by name
    pub fn option_index(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|o| o == option)
    }
}

impl Signable for ElectionTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.authority_public)
    }

    fn inputs(&self) -> Vec<Identifier> {
        // No inputs requires for election
        vec![]
    }

    /// Validate the election transaction
    fn validate_tx<S: Store>(&self, _store: &S) -> Result<(), ValidationError> {
        if self.id.transaction_type != TransactionType::Election || self.id.election() != self.id
        {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let unique: HashSet<&String> = self.options.iter().collect();
        if self.options.is_empty() || unique.len() != self.options.len() {
            return Err(ValidationError::InvalidVotingOptions);
        }

        Ok(())
    }
}

/// Check that a transaction was signed by the election authority
pub(crate) fn check_authority<S: Store>(
    store: &S,
    election_id: Identifier,
    authority_public: &PublicKey,
) -> Result<Signed<ElectionTransaction>, ValidationError> {
    let election = store.get_election(election_id)?;
    if &election.authority_public != authority_public {
        return Err(ValidationError::AuthorityPublicKeyMismatch);
    }
    Ok(election)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn create_new_election() {
        let store = MemStore::default();

        // Create election authority and oracle keys
        let (authority_secret, authority_public) = generate_keypair();
        let (_oracle_secret, oracle_public) = generate_keypair();

        let mut election =
            ElectionTransaction::new(authority_public, OracleConfig::new(oracle_public, 1));

        // Validation should fail without options
        assert!(matches!(
            election.validate_tx(&store),
            Err(ValidationError::InvalidVotingOptions)
        ));

        // Validation should fail with duplicate options
        election.set_voting_options(vec!["yes".into(), "yes".into()]);
        assert!(election.validate_tx(&store).is_err());

        election.set_voting_options(vec!["yes".into(), "no".into(), "abstain".into()]);
        election.validate_tx(&store).unwrap();
        assert_eq!(election.num_options(), 3);
        assert_eq!(election.option_index("no"), Some(1));
        assert_eq!(election.option_index("maybe"), None);

        // Check inputs
        assert!(election.inputs().is_empty());

        // Turn it into a generic transaction and check some thing
        let election_generic = Transaction::Election(election.clone());
        assert!(election_generic.transaction_type() == TransactionType::Election);
        assert!(election_generic.id() == election.id);

        // Finalize election transaction by signing it
        let election = Signed::sign(&authority_secret, election).unwrap();
        let election_generic = SignedTransaction::Election(election.clone());
        assert_eq!(
            format!("{}", election_generic.transaction_type()),
            "election"
        );

        // Validate the election transaction
        election.verify_signature().unwrap();
        election.validate(&store).unwrap();
    }
}

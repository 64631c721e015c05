use crate::*;
use ed25519_dalek::PublicKey;
use log::debug;

/// Transaction 9: Distribution
///
/// The election authority fixes the seed and the number of groups. From here on every voter's
/// group is determined; anyone can recompute it with [`Grouping::load`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DistributionTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub authority_public: PublicKey,

    pub number_of_groups: u32,

    /// The finalized beacon seed
    #[serde(with = "hex::serde")]
    pub seed: Seed,
}

impl DistributionTransaction {
    pub fn new(
        election: Identifier,
        authority_public: PublicKey,
        number_of_groups: u32,
        seed: Seed,
    ) -> Self {
        DistributionTransaction {
            id: DistributionTransaction::build_id(election),
            election,
            authority_public,
            number_of_groups,
            seed,
        }
    }

    /// Build a distribution from the finalized seed currently on the ledger
    pub fn prepare<S: Store>(
        store: &S,
        election: Identifier,
        authority_public: PublicKey,
        number_of_groups: u32,
    ) -> Result<Self, ValidationError> {
        let seed = RandomnessBeacon::load(store, election)?.seed()?;
        Ok(DistributionTransaction::new(
            election,
            authority_public,
            number_of_groups,
            seed,
        ))
    }

    pub fn build_id(election: Identifier) -> Identifier {
        Identifier::singleton(election, TransactionType::Distribution)
    }
}

impl Signable for DistributionTransaction {
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
    ///  - Validates that the election is in the reveal phase
    ///  - Validates that the beacon seed is final and equal to the declared seed
    ///  - Validates that the voters can be split into the declared number of groups
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.id != DistributionTransaction::build_id(self.election) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        check_authority(store, self.election, &self.authority_public)?;

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Reveal {
            return Err(ValidationError::WrongPhase(phase));
        }

        let seed = RandomnessBeacon::load(store, self.election)?.seed()?;
        if seed != self.seed {
            return Err(ValidationError::SeedMismatch);
        }

        let voters = VoterRegistry::load(store, self.election)?.to_vec();
        shuffle(&self.seed, &voters, self.number_of_groups as usize)?;

        Ok(())
    }
}

impl Grouping {
    /// Recompute the grouping of a distributed election from the ledger
    pub fn load<S: Store>(store: &S, election_id: Identifier) -> Result<Self, ValidationError> {
        let election = election_id.election();
        let distribution = store.get_distribution(DistributionTransaction::build_id(election))?;
        let voters = VoterRegistry::load(store, election)?.to_vec();
        let grouping = shuffle(
            &distribution.seed,
            &voters,
            distribution.number_of_groups as usize,
        )?;

        debug!(
            "election {} distributed into groups of sizes {:?}",
            election,
            grouping.sizes()
        );
        Ok(grouping)
    }
}

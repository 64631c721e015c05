use crate::*;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// Hash a value for a commit-reveal commitment
pub fn commitment_hash(value: &[u8]) -> [u8; 32] {
    let mut hash = [0; 32];
    hash.copy_from_slice(&Sha256::digest(value));
    hash
}

/// The phase of a single commit-reveal round
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Commit,
    Reveal,
}

impl From<RoundPhase> for ElectionPhase {
    fn from(phase: RoundPhase) -> Self {
        match phase {
            RoundPhase::Commit => ElectionPhase::Commit,
            RoundPhase::Reveal => ElectionPhase::Reveal,
        }
    }
}

/// A committed hash and, once revealed, the value behind it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub owner: VoterId,
    pub hash: [u8; 32],
    pub revealed: Option<Vec<u8>>,
}

impl Commitment {
    pub fn is_revealed(&self) -> bool {
        self.revealed.is_some()
    }
}

/// A commit-reveal round among any number of owners.
///
/// The round only ever moves from `Commit` to `Reveal`. Commitments are accepted in the commit
/// phase, reveals in the reveal phase, and a reveal is only accepted when it hashes to the
/// owner's commitment.
#[derive(Clone, Debug)]
pub struct CommitRevealRound {
    phase: RoundPhase,
    commitments: IndexMap<VoterId, Commitment>,
}

impl Default for CommitRevealRound {
    fn default() -> Self {
        CommitRevealRound::new()
    }
}

impl CommitRevealRound {
    pub fn new() -> Self {
        CommitRevealRound {
            phase: RoundPhase::Commit,
            commitments: IndexMap::new(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn commit(&mut self, owner: VoterId, hash: [u8; 32]) -> Result<(), ValidationError> {
        if self.phase != RoundPhase::Commit {
            return Err(ValidationError::WrongPhase(self.phase.into()));
        }
        if self.commitments.contains_key(&owner) {
            return Err(ValidationError::AlreadyCommitted(owner));
        }

        self.commitments.insert(
            owner,
            Commitment {
                owner,
                hash,
                revealed: None,
            },
        );
        Ok(())
    }

    /// Close the commit phase. Calling it again is a no-op.
    pub fn start_reveal(&mut self) {
        self.phase = RoundPhase::Reveal;
    }

    pub fn reveal(&mut self, owner: VoterId, value: &[u8]) -> Result<(), ValidationError> {
        if self.phase != RoundPhase::Reveal {
            return Err(ValidationError::WrongPhase(self.phase.into()));
        }

        let commitment = self
            .commitments
            .get_mut(&owner)
            .ok_or(ValidationError::NotCommitted(owner))?;

        if commitment.revealed.is_some() {
            return Err(ValidationError::AlreadyRevealed(owner));
        }
        if commitment_hash(value) != commitment.hash {
            return Err(ValidationError::HashMismatch);
        }

        commitment.revealed = Some(value.to_vec());
        Ok(())
    }

    pub fn get(&self, owner: &VoterId) -> Option<&Commitment> {
        self.commitments.get(owner)
    }

    /// All commitments, in the order they were made
    pub fn commitments(&self) -> impl Iterator<Item = &Commitment> {
        self.commitments.values()
    }

    /// Owners who committed but have not revealed yet
    pub fn pending_reveals(&self) -> Vec<VoterId> {
        self.commitments
            .values()
            .filter(|c| !c.is_revealed())
            .map(|c| c.owner)
            .collect()
    }

    /// Every commitment has been revealed
    pub fn is_complete(&self) -> bool {
        self.commitments.values().all(|c| c.is_revealed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> VoterId {
        VoterId::from(&generate_keypair().1)
    }

    #[test]
    fn test_commit_reveal_soundness() {
        let alice = owner();
        let value = b"alice's secret".to_vec();

        let mut round = CommitRevealRound::new();
        round.commit(alice, commitment_hash(&value)).unwrap();
        assert!(matches!(
            round.commit(alice, commitment_hash(&value)),
            Err(ValidationError::AlreadyCommitted(_))
        ));

        // Reveal before the phase change
        assert!(matches!(
            round.reveal(alice, &value),
            Err(ValidationError::WrongPhase(ElectionPhase::Commit))
        ));

        round.start_reveal();
        assert_eq!(round.pending_reveals(), vec![alice]);

        // Any other value fails
        assert!(matches!(
            round.reveal(alice, b"something else"),
            Err(ValidationError::HashMismatch)
        ));

        round.reveal(alice, &value).unwrap();
        assert!(round.is_complete());
        assert_eq!(round.get(&alice).unwrap().revealed.as_deref(), Some(&value[..]));

        assert!(matches!(
            round.reveal(alice, &value),
            Err(ValidationError::AlreadyRevealed(_))
        ));
    }

    #[test]
    fn test_reveal_without_commit() {
        let mut round = CommitRevealRound::new();
        round.start_reveal();

        let bob = owner();
        assert!(matches!(
            round.reveal(bob, b"anything"),
            Err(ValidationError::NotCommitted(_))
        ));

        // Commitments are closed once the reveal phase starts
        assert!(matches!(
            round.commit(bob, commitment_hash(b"anything")),
            Err(ValidationError::WrongPhase(ElectionPhase::Reveal))
        ));
    }

    #[test]
    fn test_pending_reveals() {
        let owners: Vec<VoterId> = (0..3).map(|_| owner()).collect();

        let mut round = CommitRevealRound::new();
        for (i, o) in owners.iter().enumerate() {
            round.commit(*o, commitment_hash(&[i as u8])).unwrap();
        }
        round.start_reveal();
        round.reveal(owners[1], &[1]).unwrap();

        assert_eq!(round.pending_reveals(), vec![owners[0], owners[2]]);
        assert!(!round.is_complete());
        assert_eq!(round.commitments().count(), 3);
    }
}

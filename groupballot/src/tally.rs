use crate::*;
use ed25519_dalek::PublicKey;
use indexmap::IndexMap;
use log::{info, warn};

/// Transaction 13: GroupTotal
///
/// A voter's count of the votes in its group, one entry per option. Only the shape is checked
/// on write; members that disagree are reported by [`calculate_totals`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupTotalTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub voter: PublicKey,

    pub totals: Vec<u64>,
}

impl GroupTotalTransaction {
    pub fn new(election: Identifier, voter: PublicKey, totals: Vec<u64>) -> Self {
        GroupTotalTransaction {
            id: GroupTotalTransaction::build_id(election, &VoterId::from(&voter)),
            election,
            voter,
            totals,
        }
    }

    pub fn build_id(election: Identifier, voter: &VoterId) -> Identifier {
        Identifier::new(election, TransactionType::GroupTotal, voter.as_bytes())
    }

    pub fn voter_id(&self) -> VoterId {
        VoterId::from(&self.voter)
    }
}

impl Signable for GroupTotalTransaction {
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
        if self.id != GroupTotalTransaction::build_id(self.election, &voter) {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Distributed {
            return Err(ValidationError::WrongPhase(phase));
        }

        let election = store.get_election(self.election)?;
        if self.totals.len() != election.num_options() {
            return Err(ValidationError::WrongTotalsLength {
                expected: election.num_options(),
                found: self.totals.len(),
            });
        }

        let grouping = Grouping::load(store, self.election)?;
        let group_size = grouping
            .members_of(&voter)
            .ok_or(ValidationError::NotRegistered(voter))?
            .len();
        // An overflowing sum is reported as u64::MAX
        let sum = self
            .totals
            .iter()
            .try_fold(0u64, |acc, t| acc.checked_add(*t))
            .unwrap_or(u64::MAX);
        if sum > group_size as u64 {
            return Err(ValidationError::TotalsExceedGroupSize { sum, group_size });
        }

        if store.get_transaction(self.id).is_some() {
            return Err(ValidationError::AlreadyBroadcast(voter));
        }

        Ok(())
    }
}

/// A voter's own count of its group's votes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalTally {
    /// Votes per option
    pub totals: Vec<u64>,

    /// Voters whose vote was counted, the tallying voter included
    pub counted: Vec<VoterId>,

    /// Peers that sent nothing (or never completed the key exchange)
    pub missing: Vec<VoterId>,

    /// Peers whose ciphertext did not decrypt to a valid option
    pub rejected: Vec<VoterId>,
}

impl LocalTally {
    pub fn new(num_options: usize) -> Self {
        LocalTally {
            totals: vec![0; num_options],
            ..Default::default()
        }
    }

    /// Count a vote. Returns false, counting nothing, if the option is out of range.
    pub fn count(&mut self, voter: VoterId, option: usize) -> bool {
        match self.totals.get_mut(option) {
            Some(slot) => {
                *slot += 1;
                self.counted.push(voter);
                true
            }
            None => {
                warn!("vote from {} names unknown option {}", voter, option);
                self.rejected.push(voter);
                false
            }
        }
    }

    /// Every group member was counted
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.rejected.is_empty()
    }
}

/// The result of an election
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    /// Votes per option, over all groups
    pub totals: Vec<u64>,

    /// Option with the most votes; ties go to the lowest index
    pub winner: Option<usize>,

    /// The totals counted for each group
    pub group_totals: Vec<Vec<u64>>,

    /// Groups whose members broadcast different totals
    pub divergent_groups: Vec<usize>,
}

impl Tally {
    pub fn winner_option<'a>(&self, election: &'a ElectionTransaction) -> Option<&'a str> {
        self.winner
            .and_then(|w| election.options.get(w))
            .map(|o| o.as_str())
    }
}

/// The option with the highest total, the lowest index winning a tie
pub fn winner(totals: &[u64]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, total) in totals.iter().enumerate() {
        match best {
            Some((_, best_total)) if *total <= best_total => {}
            _ => best = Some((index, *total)),
        }
    }
    best.map(|(index, _)| index)
}

/// Fold the broadcast group totals into the election result.
///
/// Every registered voter must have broadcast. Each group contributes the totals broadcast by
/// most of its members (on a tie, the earliest on the ledger). This only picks which vector is
/// summed and reported: nothing on the ledger is corrected, and every group whose members
/// disagree is listed in `divergent_groups` for the caller to act on.
pub fn calculate_totals<S: Store>(store: &S, election_id: Identifier) -> Result<Tally, ValidationError> {
    let election_id = election_id.election();
    let election = store.get_election(election_id)?;
    let grouping = Grouping::load(store, election_id)?;

    let broadcasts: IndexMap<VoterId, Vec<u64>> = store
        .get_multiple(election_id, TransactionType::GroupTotal)
        .into_iter()
        .filter_map(|tx| match tx {
            SignedTransaction::GroupTotal(signed) => Some((signed.voter_id(), signed.totals.clone())),
            _ => None,
        })
        .collect();

    let missing = grouping
        .permutation()
        .iter()
        .filter(|voter| !broadcasts.contains_key(*voter))
        .count();
    if missing > 0 {
        return Err(ValidationError::TotalsNotReady(missing));
    }

    let mut totals = vec![0u64; election.num_options()];
    let mut group_totals = Vec::with_capacity(grouping.number_of_groups());
    let mut divergent_groups = Vec::new();

    for (index, members) in grouping.groups().iter().enumerate() {
        // Distinct vectors in ledger order, with how many members broadcast each
        let mut candidates: Vec<(&Vec<u64>, usize)> = Vec::new();
        for (voter, vector) in broadcasts.iter() {
            if !members.contains(voter) {
                continue;
            }
            match candidates.iter_mut().find(|(v, _)| *v == vector) {
                Some((_, count)) => *count += 1,
                None => candidates.push((vector, 1)),
            }
        }

        if candidates.len() > 1 {
            warn!(
                "group {} of election {} broadcast {} different totals",
                index,
                election_id,
                candidates.len()
            );
            divergent_groups.push(index);
        }

        let mut representative: Option<(&Vec<u64>, usize)> = None;
        for (vector, count) in candidates {
            match representative {
                Some((_, best)) if count <= best => {}
                _ => representative = Some((vector, count)),
            }
        }

        let vector = representative
            .map(|(v, _)| v.clone())
            .unwrap_or_else(|| vec![0; election.num_options()]);
        for (slot, count) in totals.iter_mut().zip(vector.iter()) {
            *slot = slot.saturating_add(*count);
        }
        group_totals.push(vector);
    }

    let winning = winner(&totals);
    info!(
        "election {} tallied: totals {:?}, winner {:?}",
        election_id, totals, winning
    );

    Ok(Tally {
        totals,
        winner: winning,
        group_totals,
        divergent_groups,
    })
}

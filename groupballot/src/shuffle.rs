use crate::*;
use sha2::{Digest, Sha512};

const SHUFFLE_DOMAIN: &[u8] = b"groupballot-shuffle-v1";

/// The result of shuffling an election's voters into groups.
///
/// A pure function of the seed, the voters in registration order and the number of groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grouping {
    seed: Seed,
    permutation: Vec<VoterId>,
    groups: Vec<Vec<VoterId>>,
}

impl Grouping {
    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn number_of_groups(&self) -> usize {
        self.groups.len()
    }

    /// The members of a group, in shuffled order
    pub fn group(&self, index: usize) -> Option<&[VoterId]> {
        self.groups.get(index).map(|g| g.as_slice())
    }

    pub fn groups(&self) -> &[Vec<VoterId>] {
        &self.groups
    }

    /// The group a voter was assigned to
    pub fn group_of(&self, voter: &VoterId) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(voter))
    }

    /// The members of a voter's group, including the voter
    pub fn members_of(&self, voter: &VoterId) -> Option<&[VoterId]> {
        self.group_of(voter).and_then(|g| self.group(g))
    }

    pub fn same_group(&self, a: &VoterId, b: &VoterId) -> bool {
        match (self.group_of(a), self.group_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.groups.iter().map(|g| g.len()).collect()
    }

    /// The voters in shuffled order
    pub fn permutation(&self) -> &[VoterId] {
        &self.permutation
    }
}

/// Shuffle voters with a seeded Fisher-Yates pass and cut the result into near-equal groups.
///
/// Position `i` (from last to first) is swapped with an index in `[0, i]` taken from
/// `SHA-512(seed, i)` reduced modulo `i + 1`. The first `n % g` groups get one extra member.
pub fn shuffle(seed: &Seed, voters: &[VoterId], number_of_groups: usize) -> Result<Grouping, ValidationError> {
    let n = voters.len();
    if number_of_groups == 0 || number_of_groups > n {
        return Err(ValidationError::InvalidGroupCount {
            groups: number_of_groups,
            voters: n,
        });
    }

    let mut permutation = voters.to_vec();
    for i in (1..n).rev() {
        let j = shuffle_index(seed, i);
        permutation.swap(i, j);
    }

    let base = n / number_of_groups;
    let extra = n % number_of_groups;
    let mut groups = Vec::with_capacity(number_of_groups);
    let mut start = 0;
    for g in 0..number_of_groups {
        let size = if g < extra { base + 1 } else { base };
        groups.push(permutation[start..start + size].to_vec());
        start += size;
    }

    Ok(Grouping {
        seed: *seed,
        permutation,
        groups,
    })
}

// Index in [0, i] from the whole 512-bit digest, so the modulo bias is negligible
fn shuffle_index(seed: &Seed, i: usize) -> usize {
    let mut hasher = Sha512::new();
    hasher.update(SHUFFLE_DOMAIN);
    hasher.update(seed);
    hasher.update(&(i as u64).to_be_bytes());
    let digest = hasher.finalize();

    let modulus = i as u128 + 1;
    let reduced = digest
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus);
    reduced as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn voters(n: usize) -> Vec<VoterId> {
        (0..n)
            .map(|i| {
                let mut id = [0; 32];
                id[..8].copy_from_slice(&(i as u64).to_be_bytes());
                VoterId(id)
            })
            .collect()
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let voters = voters(12);
        let seed = [42; 32];

        let a = shuffle(&seed, &voters, 3).unwrap();
        let b = shuffle(&seed, &voters, 3).unwrap();
        assert_eq!(a, b);

        // Every voter appears exactly once
        let unique: HashSet<&VoterId> = a.permutation().iter().collect();
        assert_eq!(unique.len(), 12);
        assert_eq!(a.permutation().len(), 12);

        // A different seed gives a different order
        let c = shuffle(&[43; 32], &voters, 3).unwrap();
        assert_ne!(a.permutation(), c.permutation());
    }

    #[test]
    fn test_group_balance() {
        let voters = voters(12);
        let seed = [7; 32];

        let grouping = shuffle(&seed, &voters, 3).unwrap();
        assert_eq!(grouping.sizes(), vec![4, 4, 4]);

        let grouping = shuffle(&seed, &voters, 5).unwrap();
        let sizes = grouping.sizes();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);
        assert_eq!(sizes.iter().sum::<usize>(), 12);
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);

        let grouping = shuffle(&seed, &voters, 12).unwrap();
        assert!(grouping.sizes().iter().all(|s| *s == 1));
    }

    #[test]
    fn test_group_lookup() {
        let voters = voters(10);
        let grouping = shuffle(&[1; 32], &voters, 3).unwrap();

        for voter in &voters {
            let g = grouping.group_of(voter).unwrap();
            assert!(grouping.group(g).unwrap().contains(voter));
            assert!(grouping.same_group(voter, voter));
        }

        let first = grouping.group(0).unwrap();
        let second = grouping.group(1).unwrap();
        assert!(grouping.same_group(&first[0], &first[1]));
        assert!(!grouping.same_group(&first[0], &second[0]));
        assert!(grouping.group_of(&VoterId([0xff; 32])).is_none());

        // Groups are contiguous blocks of the permutation
        let flattened: Vec<VoterId> = grouping.groups().iter().flatten().copied().collect();
        assert_eq!(flattened, grouping.permutation());
    }

    #[test]
    fn test_invalid_group_count() {
        let voters = voters(4);
        assert!(matches!(
            shuffle(&[0; 32], &voters, 0),
            Err(ValidationError::InvalidGroupCount { groups: 0, voters: 4 })
        ));
        assert!(matches!(
            shuffle(&[0; 32], &voters, 5),
            Err(ValidationError::InvalidGroupCount { groups: 5, voters: 4 })
        ));
        assert!(shuffle(&[0; 32], &[], 1).is_err());
    }

    #[test]
    fn test_shuffle_index_in_range() {
        let seed = [9; 32];
        for i in 0..200 {
            assert!(shuffle_index(&seed, i) <= i);
        }
        assert_eq!(shuffle_index(&seed, 0), 0);
    }
}

use crate::*;
use ed25519_dalek::{PublicKey, SecretKey};
use log::warn;
use std::collections::HashMap;

/// A participant's local state: signing key, beacon contribution, private key-exchange values
/// and the vote itself. Nothing here is ever written to the ledger in the clear.
///
/// Methods that act on the election return signed transactions for the caller to submit.
pub struct Voter {
    secret: SecretKey,
    public: PublicKey,
    election: Identifier,
    vote: Option<usize>,
    commit_value: Option<Vec<u8>>,
    dh_privates: HashMap<Identifier, DhPrivate>,
}

impl Voter {
    /// Create a voter with a fresh identity
    pub fn new(election: Identifier) -> Self {
        let (secret, public) = generate_keypair();
        Voter::from_secret(election, secret)
    }

    pub fn from_secret(election: Identifier, secret: SecretKey) -> Self {
        let public = PublicKey::from(&secret);
        Voter {
            secret,
            public,
            election,
            vote: None,
            commit_value: None,
            dh_privates: HashMap::new(),
        }
    }

    pub fn id(&self) -> VoterId {
        VoterId::from(&self.public)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn election(&self) -> Identifier {
        self.election
    }

    pub fn vote(&self) -> Option<usize> {
        self.vote
    }

    #[cfg(test)]
    pub(crate) fn secret_for_tests(&self) -> &SecretKey {
        &self.secret
    }

    pub fn register(&self) -> Result<Signed<RegistrationTransaction>, Error> {
        let tx = RegistrationTransaction::new(self.election, self.public);
        Signed::sign(&self.secret, tx)
    }

    /// Commit to a fresh random beacon contribution
    pub fn commit(&mut self) -> Result<Signed<CommitmentTransaction>, Error> {
        let value = random_bytes().to_vec();
        let tx = CommitmentTransaction::new(self.election, self.public, commitment_hash(&value));
        let signed = Signed::sign(&self.secret, tx)?;
        self.commit_value = Some(value);
        Ok(signed)
    }

    pub fn reveal(&self) -> Result<Signed<RevealTransaction>, Error> {
        let value = self.commit_value.clone().ok_or(Error::NothingToReveal)?;
        let tx = RevealTransaction::new(self.election, self.public, value);
        Signed::sign(&self.secret, tx)
    }

    /// Choose the option to vote for. A vote can only be chosen once.
    pub fn choose<S: Store>(&mut self, store: &S, option: usize) -> Result<(), Error> {
        if self.vote.is_some() {
            return Err(Error::AlreadyVoted);
        }
        let election = store.get_election(self.election).map_err(ValidationError::from)?;
        if option >= election.num_options() {
            return Err(Error::NoSuchOption(option));
        }
        self.vote = Some(option);
        Ok(())
    }

    /// The other members of this voter's group
    pub fn group_peers<S: Store>(&self, store: &S) -> Result<Vec<VoterId>, Error> {
        let me = self.id();
        let grouping = Grouping::load(store, self.election)?;
        let members = grouping
            .members_of(&me)
            .ok_or(ValidationError::NotRegistered(me))?;
        Ok(members.iter().filter(|v| **v != me).copied().collect())
    }

    /// Open the edge to a peer
    pub fn deploy_edge(&self, peer: VoterId) -> Result<Signed<EdgeTransaction>, Error> {
        let tx = EdgeTransaction::new(self.election, self.public, peer);
        Signed::sign(&self.secret, tx)
    }

    /// Contribute to the key exchange on the edge to a peer.
    ///
    /// The private value for the edge is created on the first call and reused afterwards.
    pub fn transmit_a<S: Store>(
        &mut self,
        store: &S,
        peer: VoterId,
    ) -> Result<Signed<KeyContributionTransaction>, Error> {
        let edge = Edge::load(store, self.election, self.id(), peer)?;

        let public_value = match self.dh_privates.get(&edge.id) {
            Some(private) => private.public(),
            None => {
                let (private, public) = generate_a(&random_bytes())?;
                self.dh_privates.insert(edge.id, private);
                public
            }
        };

        let tx = KeyContributionTransaction::new(edge.id, self.public, public_value);
        Signed::sign(&self.secret, tx)
    }

    /// The secret shared with a peer, once both sides contributed
    pub fn shared_secret<S: Store>(&self, store: &S, peer: VoterId) -> Result<SharedSecret, Error> {
        let me = self.id();
        let edge = Edge::load(store, self.election, me, peer)?;
        let peer_public = edge.peer_contribution(&me)?;
        let private = self
            .dh_privates
            .get(&edge.id)
            .ok_or(Error::MissingPrivateValue(edge.id))?;
        Ok(generate_ab(private, &peer_public))
    }

    /// Encrypt this voter's vote for a peer
    pub fn send_vote<S: Store>(
        &self,
        store: &S,
        peer: VoterId,
    ) -> Result<Signed<EncryptedVoteTransaction>, Error> {
        let vote = self.vote.ok_or(Error::NoVoteChosen)?;
        let secret = self
            .shared_secret(store, peer)
            .map_err(|_| ValidationError::NoSharedSecret(self.id(), peer))?;
        let ciphertext = encrypt_vote(&secret, self.election, &self.id(), &peer, vote)?;

        let tx = EncryptedVoteTransaction::new(self.election, self.public, peer, ciphertext);
        Signed::sign(&self.secret, tx)
    }

    /// Decrypt the vote a peer sent to this voter
    pub fn read_vote<S: Store>(&self, store: &S, peer: VoterId) -> Result<usize, Error> {
        let me = self.id();
        let sent = EncryptedVoteTransaction::load(store, self.election, &peer, &me)?;
        let secret = self.shared_secret(store, peer)?;
        decrypt_vote(&secret, self.election, &peer, &me, &sent.ciphertext)
    }

    /// Count this voter's own vote and every vote its peers sent it
    pub fn tally_group<S: Store>(&self, store: &S) -> Result<LocalTally, Error> {
        let vote = self.vote.ok_or(Error::NoVoteChosen)?;
        let election = store.get_election(self.election).map_err(ValidationError::from)?;

        let mut tally = LocalTally::new(election.num_options());
        tally.count(self.id(), vote);

        for peer in self.group_peers(store)? {
            match self.read_vote(store, peer) {
                Ok(option) => {
                    tally.count(peer, option);
                }
                Err(Error::Validation(e)) => {
                    warn!("no vote from {}: {}", peer, e);
                    tally.missing.push(peer);
                }
                Err(Error::MissingPrivateValue(_)) => {
                    warn!("no key exchange with {}", peer);
                    tally.missing.push(peer);
                }
                Err(e) => {
                    warn!("vote from {} rejected: {}", peer, e);
                    tally.rejected.push(peer);
                }
            }
        }

        Ok(tally)
    }

    /// Broadcast a group count
    pub fn broadcast_group_total(
        &self,
        tally: &LocalTally,
    ) -> Result<Signed<GroupTotalTransaction>, Error> {
        let tx = GroupTotalTransaction::new(self.election, self.public, tally.totals.clone());
        Signed::sign(&self.secret, tx)
    }
}

impl std::fmt::Debug for Voter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Voter")
            .field("id", &self.id())
            .field("election", &self.election)
            .finish()
    }
}

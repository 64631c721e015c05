use crate::*;
use ed25519_dalek::PublicKey;
use hkdf::Hkdf;
use rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use x25519_dalek::StaticSecret;

/// A voter's public Diffie-Hellman contribution to an edge (an X25519 point)
pub type DhPublic = [u8; 32];

/// A voter's private Diffie-Hellman value for one edge. Never leaves the voter.
#[derive(Clone)]
pub struct DhPrivate(StaticSecret);

impl DhPrivate {
    pub fn public(&self) -> DhPublic {
        *x25519_dalek::PublicKey::from(&self.0).as_bytes()
    }
}

impl std::fmt::Debug for DhPrivate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "DhPrivate(..)")
    }
}

/// The secret both ends of an edge derive
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "SharedSecret(..)")
    }
}

/// Derive a private value and its public contribution from a local seed
pub fn generate_a(local_seed: &[u8]) -> Result<(DhPrivate, DhPublic), Error> {
    let h = Hkdf::<Sha256>::new(None, local_seed);
    let mut seed = [0u8; 32];
    h.expand(b"groupballot_dh_private", &mut seed)
        .map_err(|_| Error::KeyDerivation)?;

    let mut rng = ChaCha20Rng::from_seed(seed);
    let private = DhPrivate(StaticSecret::new(&mut rng));
    let public = private.public();

    Ok((private, public))
}

/// Derive the shared secret from our private value and the peer's contribution
pub fn generate_ab(private: &DhPrivate, peer_public: &DhPublic) -> SharedSecret {
    let peer = x25519_dalek::PublicKey::from(*peer_public);
    let shared = private.0.diffie_hellman(&peer);
    SharedSecret(*shared.as_bytes())
}

/// Whether a contribution lies in the small-order subgroup (or the twist's), which would force
/// a predictable shared secret.
///
/// Clamped X25519 scalars are multiples of the cofactor, so such points map to zero under any of
/// them.
pub fn is_small_order(public: &DhPublic) -> bool {
    let scalar = StaticSecret::from([0x5a; 32]);
    let shared = scalar.diffie_hellman(&x25519_dalek::PublicKey::from(*public));
    shared.as_bytes().iter().all(|b| *b == 0)
}

/// Order a pair of voters so that (a, b) and (b, a) give the same result
pub fn canonical_pair(x: VoterId, y: VoterId) -> (VoterId, VoterId) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Transaction 10: Edge
///
/// Opens a key exchange between two voters of the same group. There is one edge per unordered
/// pair; either member may create it, and creating it again resolves to the existing edge.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EdgeTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub creator: PublicKey,

    /// The lower voter of the pair
    pub peer_a: VoterId,

    /// The higher voter of the pair
    pub peer_b: VoterId,
}

impl EdgeTransaction {
    pub fn new(election: Identifier, creator: PublicKey, peer: VoterId) -> Self {
        let (peer_a, peer_b) = canonical_pair(VoterId::from(&creator), peer);
        EdgeTransaction {
            id: EdgeTransaction::build_id(election, peer_a, peer_b),
            election,
            creator,
            peer_a,
            peer_b,
        }
    }

    /// The edge id of a pair, in either argument order
    pub fn build_id(election: Identifier, x: VoterId, y: VoterId) -> Identifier {
        let (a, b) = canonical_pair(x, y);
        let mut unique_info = Vec::with_capacity(64);
        unique_info.extend_from_slice(a.as_bytes());
        unique_info.extend_from_slice(b.as_bytes());
        Identifier::new(election, TransactionType::Edge, &unique_info)
    }
}

impl Signable for EdgeTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.creator)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    fn is_idempotent(&self) -> bool {
        true
    }

    /// Validate the transaction
    ///
    /// The validation does the following:
    ///  - Validates that the pair is two distinct voters in canonical order
    ///  - Validates that the election has been distributed
    ///  - Validates that the creator is one of the pair
    ///  - Validates that both voters are registered and in the same group
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        if self.peer_a == self.peer_b {
            return Err(ValidationError::SelfEdge);
        }
        if self.peer_a > self.peer_b
            || self.id != EdgeTransaction::build_id(self.election, self.peer_a, self.peer_b)
        {
            return Err(ValidationError::MismatchedTransactionType);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Distributed {
            return Err(ValidationError::WrongPhase(phase));
        }

        let creator = VoterId::from(&self.creator);
        if creator != self.peer_a && creator != self.peer_b {
            return Err(ValidationError::NotEdgeParticipant(creator, self.id));
        }

        let registry = VoterRegistry::load(store, self.election)?;
        registry.require(&self.peer_a)?;
        registry.require(&self.peer_b)?;

        let grouping = Grouping::load(store, self.election)?;
        if !grouping.same_group(&self.peer_a, &self.peer_b) {
            return Err(ValidationError::NotSameGroup(self.peer_a, self.peer_b));
        }

        Ok(())
    }
}

/// Transaction 11: KeyContribution
///
/// One side's public Diffie-Hellman value for an edge. Each side contributes once.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KeyContributionTransaction {
    pub id: Identifier,
    pub election: Identifier,
    pub edge: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub contributor: PublicKey,

    #[serde(with = "hex::serde")]
    pub public_value: DhPublic,
}

impl KeyContributionTransaction {
    pub fn new(edge: Identifier, contributor: PublicKey, public_value: DhPublic) -> Self {
        KeyContributionTransaction {
            id: KeyContributionTransaction::build_id(edge, &VoterId::from(&contributor)),
            election: edge.election(),
            edge,
            contributor,
            public_value,
        }
    }

    pub fn build_id(edge: Identifier, contributor: &VoterId) -> Identifier {
        let mut unique_info = edge.to_bytes();
        unique_info.extend_from_slice(contributor.as_bytes());
        Identifier::new(edge.election(), TransactionType::KeyContribution, &unique_info)
    }

    pub fn contributor_id(&self) -> VoterId {
        VoterId::from(&self.contributor)
    }
}

impl Signable for KeyContributionTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.contributor)
    }

    // A missing edge is reported as UnknownEdge, not as a missing input
    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        let contributor = self.contributor_id();
        if self.id != KeyContributionTransaction::build_id(self.edge, &contributor) {
            return Err(ValidationError::MismatchedTransactionType);
        }
        if self.edge.election() != self.election {
            return Err(ValidationError::ElectionMismatch);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Distributed {
            return Err(ValidationError::WrongPhase(phase));
        }

        let edge = Edge::load_by_id(store, self.edge)?;
        if !edge.contains(&contributor) {
            return Err(ValidationError::NotEdgeParticipant(contributor, self.edge));
        }
        if edge.contribution_of(&contributor).is_some() {
            return Err(ValidationError::AlreadyContributed(contributor, self.edge));
        }
        if is_small_order(&self.public_value) {
            return Err(ValidationError::WeakKeyContribution(contributor, self.edge));
        }

        Ok(())
    }
}

/// An edge and its contributions, as read from the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub id: Identifier,
    pub peer_a: VoterId,
    pub peer_b: VoterId,
    contribution_a: Option<DhPublic>,
    contribution_b: Option<DhPublic>,
}

impl Edge {
    /// Load the edge between two voters, in either argument order
    pub fn load<S: Store>(
        store: &S,
        election: Identifier,
        x: VoterId,
        y: VoterId,
    ) -> Result<Self, ValidationError> {
        Edge::load_by_id(store, EdgeTransaction::build_id(election, x, y))
    }

    pub fn load_by_id<S: Store>(store: &S, id: Identifier) -> Result<Self, ValidationError> {
        let edge = store
            .get_edge(id)
            .map_err(|_| ValidationError::UnknownEdge(id))?;

        let contribution = |voter: &VoterId| {
            store
                .get_key_contribution(KeyContributionTransaction::build_id(id, voter))
                .ok()
                .map(|tx| tx.public_value)
        };

        Ok(Edge {
            id,
            peer_a: edge.peer_a,
            peer_b: edge.peer_b,
            contribution_a: contribution(&edge.peer_a),
            contribution_b: contribution(&edge.peer_b),
        })
    }

    pub fn contains(&self, voter: &VoterId) -> bool {
        &self.peer_a == voter || &self.peer_b == voter
    }

    /// The other end of the edge
    pub fn peer_of(&self, voter: &VoterId) -> Option<VoterId> {
        if &self.peer_a == voter {
            Some(self.peer_b)
        } else if &self.peer_b == voter {
            Some(self.peer_a)
        } else {
            None
        }
    }

    pub fn contribution_of(&self, voter: &VoterId) -> Option<DhPublic> {
        if &self.peer_a == voter {
            self.contribution_a
        } else if &self.peer_b == voter {
            self.contribution_b
        } else {
            None
        }
    }

    /// Both sides have contributed
    pub fn is_complete(&self) -> bool {
        self.contribution_a.is_some() && self.contribution_b.is_some()
    }

    /// The peer's contribution, once the exchange is complete
    pub fn peer_contribution(&self, me: &VoterId) -> Result<DhPublic, ValidationError> {
        let peer = self
            .peer_of(me)
            .ok_or(ValidationError::NotEdgeParticipant(*me, self.id))?;
        if !self.is_complete() {
            return Err(ValidationError::ExchangeIncomplete(self.id));
        }
        self.contribution_of(&peer)
            .ok_or(ValidationError::ExchangeIncomplete(self.id))
    }
}

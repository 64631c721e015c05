use crate::*;
use indexmap::IndexMap;
use log::{debug, info, warn};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("transaction {0} not found")]
pub struct TransactionNotFound(pub Identifier);

// Typed getters: fetch a transaction by id and check that it has the expected type.
macro_rules! typed_getters {
    ($($(#[$doc:meta])* $name:ident => $variant:ident($tx:ty);)+) => {
        $(
            $(#[$doc])*
            fn $name(&self, id: Identifier) -> Result<Signed<$tx>, TransactionNotFound> {
                match self.get_transaction(id) {
                    Some(SignedTransaction::$variant(tx)) => Ok(tx),
                    _ => Err(TransactionNotFound(id)),
                }
            }
        )+
    };
}

/// A transaction store
///
/// Everything in a store is readable by every participant.
pub trait Store {
    /// Get a transaction of an unknown type
    fn get_transaction(&self, id: Identifier) -> Option<SignedTransaction>;

    /// Get all transactions of a type in an election, in ledger order
    fn get_multiple(&self, election_id: Identifier, tx_type: TransactionType)
        -> Vec<SignedTransaction>;

    typed_getters! {
        /// Get an election transaction
        get_election => Election(ElectionTransaction);
        /// Get a voter's registration
        get_registration => Registration(RegistrationTransaction);
        /// Get the transaction that opened the commit phase
        get_commit_phase => CommitPhase(CommitPhaseTransaction);
        /// Get a voter's commitment
        get_commitment => Commitment(CommitmentTransaction);
        /// Get the transaction that opened the reveal phase
        get_reveal_phase => RevealPhase(RevealPhaseTransaction);
        /// Get a voter's reveal
        get_reveal => Reveal(RevealTransaction);
        /// Get an oracle request
        get_oracle_request => OracleRequest(OracleRequestTransaction);
        /// Get an oracle response
        get_oracle_response => OracleResponse(OracleResponseTransaction);
        /// Get the distribution transaction
        get_distribution => Distribution(DistributionTransaction);
        /// Get an edge
        get_edge => Edge(EdgeTransaction);
        /// Get a key-exchange contribution
        get_key_contribution => KeyContribution(KeyContributionTransaction);
        /// Get an encrypted vote
        get_encrypted_vote => EncryptedVote(EncryptedVoteTransaction);
        /// Get a voter's group totals
        get_group_total => GroupTotal(GroupTotalTransaction);
    }

    /// Get the current phase of an election
    fn get_phase(&self, election_id: Identifier) -> Result<ElectionPhase, ValidationError> {
        let election_id = election_id.election();
        self.get_election(election_id)?;

        let phase = if self
            .get_transaction(DistributionTransaction::build_id(election_id))
            .is_some()
        {
            ElectionPhase::Distributed
        } else if self
            .get_transaction(RevealPhaseTransaction::build_id(election_id))
            .is_some()
        {
            ElectionPhase::Reveal
        } else if self
            .get_transaction(CommitPhaseTransaction::build_id(election_id))
            .is_some()
        {
            ElectionPhase::Commit
        } else {
            ElectionPhase::Registration
        };

        Ok(phase)
    }

    /// Number of registered voters in an election
    fn get_voter_count(&self, election_id: Identifier) -> usize {
        self.get_multiple(election_id, TransactionType::Registration)
            .len()
    }
}

/// A notification emitted when a transaction is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    VoterRegistered {
        election: Identifier,
        voter: VoterId,
    },
    PhaseChanged {
        election: Identifier,
        phase: ElectionPhase,
    },
    OracleQuerySent {
        election: Identifier,
        request: Identifier,
        description: String,
    },
    OracleValueReceived {
        election: Identifier,
        request: Identifier,
        value: Vec<u8>,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Event::VoterRegistered { voter, .. } => write!(f, "voter {} registered", voter),
            Event::PhaseChanged { phase, .. } => write!(f, "election entered phase {}", phase),
            Event::OracleQuerySent {
                request,
                description,
                ..
            } => write!(f, "{} (request {})", description, request),
            Event::OracleValueReceived { request, .. } => {
                write!(f, "oracle value received for request {}", request)
            }
        }
    }
}

/// A simple ledger that keeps transactions in memory, in the order they were applied
#[derive(Default, Clone)]
pub struct MemStore {
    inner: IndexMap<Identifier, SignedTransaction>,
    events: Vec<Event>,
}

impl MemStore {
    /// Store a transaction without validating it
    pub fn set(&mut self, tx: SignedTransaction) {
        self.inner.insert(tx.id(), tx);
    }

    /// Validate a transaction against the current state and append it.
    ///
    /// Returns the id of the stored transaction. Idempotent transactions (edges) that are already
    /// stored resolve to the existing record without writing anything.
    pub fn apply(&mut self, tx: SignedTransaction) -> Result<Identifier, ValidationError> {
        let id = tx.id();

        for input in tx.inputs() {
            if self.get_transaction(input).is_none() {
                warn!("rejected {} {}: missing input {}", tx.transaction_type(), id, input);
                return Err(TransactionNotFound(input).into());
            }
        }

        if let Err(e) = tx.validate(self) {
            warn!("rejected {} {}: {}", tx.transaction_type(), id, e);
            return Err(e);
        }

        if self.inner.contains_key(&id) {
            if tx.is_idempotent() {
                debug!("{} {} already stored", tx.transaction_type(), id);
                return Ok(id);
            }
            warn!("rejected {} {}: duplicate", tx.transaction_type(), id);
            return Err(ValidationError::DuplicateTransaction(id));
        }

        if let Some(event) = tx.event() {
            info!("{}", event);
            self.events.push(event);
        }

        debug!("applied {} {}", tx.transaction_type(), id);
        self.inner.insert(id, tx);

        Ok(id)
    }

    /// All transactions, in ledger order
    pub fn transactions(&self) -> impl Iterator<Item = &SignedTransaction> {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Take the notifications emitted since the last call
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl Store for MemStore {
    fn get_transaction(&self, id: Identifier) -> Option<SignedTransaction> {
        self.inner.get(&id).cloned()
    }

    fn get_multiple(
        &self,
        election_id: Identifier,
        tx_type: TransactionType,
    ) -> Vec<SignedTransaction> {
        self.inner
            .iter()
            .filter(|(id, _)| {
                id.election_id == election_id.election_id && id.transaction_type == tx_type
            })
            .map(|(_, tx)| tx.clone())
            .collect()
    }
}

impl From<Vec<SignedTransaction>> for MemStore {
    fn from(item: Vec<SignedTransaction>) -> Self {
        let mut memstore = MemStore::default();
        for tx in item {
            memstore.set(tx);
        }
        memstore
    }
}

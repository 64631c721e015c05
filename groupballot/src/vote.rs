use crate::*;
use ed25519_dalek::PublicKey;

/// Transaction 12: EncryptedVote
///
/// A voter's vote, encrypted for one peer of its group under their edge's shared secret.
/// There is at most one ciphertext per direction of an edge.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EncryptedVoteTransaction {
    pub id: Identifier,
    pub election: Identifier,

    #[serde(with = "EdPublicKeyHex")]
    pub sender: PublicKey,

    pub recipient: VoterId,

    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedVoteTransaction {
    pub fn new(
        election: Identifier,
        sender: PublicKey,
        recipient: VoterId,
        ciphertext: Vec<u8>,
    ) -> Self {
        EncryptedVoteTransaction {
            id: EncryptedVoteTransaction::build_id(election, &VoterId::from(&sender), &recipient),
            election,
            sender,
            recipient,
            ciphertext,
        }
    }

    pub fn build_id(election: Identifier, sender: &VoterId, recipient: &VoterId) -> Identifier {
        let mut unique_info = Vec::with_capacity(64);
        unique_info.extend_from_slice(sender.as_bytes());
        unique_info.extend_from_slice(recipient.as_bytes());
        Identifier::new(election, TransactionType::EncryptedVote, &unique_info)
    }

    pub fn sender_id(&self) -> VoterId {
        VoterId::from(&self.sender)
    }

    /// Read the ciphertext sent from `sender` to `recipient`
    pub fn load<S: Store>(
        store: &S,
        election: Identifier,
        sender: &VoterId,
        recipient: &VoterId,
    ) -> Result<Signed<EncryptedVoteTransaction>, ValidationError> {
        store
            .get_encrypted_vote(EncryptedVoteTransaction::build_id(
                election, sender, recipient,
            ))
            .map_err(|_| ValidationError::NoSuchCiphertext(*sender, *recipient))
    }
}

impl Signable for EncryptedVoteTransaction {
    fn id(&self) -> Identifier {
        self.id
    }

    fn public(&self) -> Option<PublicKey> {
        Some(self.sender)
    }

    fn inputs(&self) -> Vec<Identifier> {
        vec![self.election]
    }

    /// Validate the transaction
    ///
    /// The validation does the following:
    ///  - Validates that the election has been distributed
    ///  - Validates that sender and recipient completed a key exchange
    ///  - Validates that the sender has not sent to this recipient before
    fn validate_tx<S: Store>(&self, store: &S) -> Result<(), ValidationError> {
        let sender = self.sender_id();
        if self.id != EncryptedVoteTransaction::build_id(self.election, &sender, &self.recipient) {
            return Err(ValidationError::MismatchedTransactionType);
        }
        if sender == self.recipient {
            return Err(ValidationError::SelfEdge);
        }

        let phase = store.get_phase(self.election)?;
        if phase != ElectionPhase::Distributed {
            return Err(ValidationError::WrongPhase(phase));
        }

        match Edge::load(store, self.election, sender, self.recipient) {
            Ok(edge) if edge.is_complete() => {}
            _ => return Err(ValidationError::NoSharedSecret(sender, self.recipient)),
        }

        if store.get_transaction(self.id).is_some() {
            return Err(ValidationError::AlreadySent(sender, self.recipient));
        }

        Ok(())
    }
}

use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead, Payload};
use aes_gcm::Aes256Gcm;
use hkdf::Hkdf;
use rand::{thread_rng, Rng};
use sha2::Sha256;
use std::convert::TryFrom;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Derive the AES-256 key for votes on an edge from the edge's shared secret
pub fn derive_vote_key(secret: &SharedSecret, election: Identifier) -> Result<[u8; 32], Error> {
    let h = Hkdf::<Sha256>::new(Some(&election.election_id[..]), secret.as_bytes());
    let mut key = [0u8; 32];
    h.expand(b"groupballot_vote_key", &mut key)
        .map_err(|_| Error::KeyDerivation)?;
    Ok(key)
}

// The ciphertext is bound to its direction on the edge
fn associated_data(sender: &VoterId, recipient: &VoterId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(64);
    aad.extend_from_slice(sender.as_bytes());
    aad.extend_from_slice(recipient.as_bytes());
    aad
}

/// Encrypt a vote for a peer.
///
/// Output is the 12 byte nonce followed by the AES-256-GCM ciphertext of the option index
/// (4 bytes, big-endian).
pub fn encrypt_vote(
    secret: &SharedSecret,
    election: Identifier,
    sender: &VoterId,
    recipient: &VoterId,
    option: usize,
) -> Result<Vec<u8>, Error> {
    let plaintext = u32::try_from(option)
        .map_err(|_| Error::NoSuchOption(option))?
        .to_be_bytes();

    let key = derive_vote_key(secret, election)?;
    let aead = Aes256Gcm::new(GenericArray::from_slice(&key));

    let mut nonce = [0u8; NONCE_LENGTH];
    thread_rng().fill(&mut nonce);

    let aad = associated_data(sender, recipient);
    let ciphertext = aead
        .encrypt(
            GenericArray::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| Error::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend(ciphertext);

    Ok(output)
}

/// Decrypt a vote sent over an edge.
///
/// Fails with `DecryptionFailed` when the secret is wrong or the ciphertext was altered, and
/// with `MalformedVote` when the plaintext is not an option index.
pub fn decrypt_vote(
    secret: &SharedSecret,
    election: Identifier,
    sender: &VoterId,
    recipient: &VoterId,
    ciphertext: &[u8],
) -> Result<usize, Error> {
    if ciphertext.len() < NONCE_LENGTH + TAG_LENGTH {
        return Err(Error::DecryptionFailed);
    }

    let key = derive_vote_key(secret, election)?;
    let aead = Aes256Gcm::new(GenericArray::from_slice(&key));

    let (nonce, encrypted) = ciphertext.split_at(NONCE_LENGTH);
    let aad = associated_data(sender, recipient);
    let plaintext = aead
        .decrypt(
            GenericArray::from_slice(nonce),
            Payload {
                msg: encrypted,
                aad: &aad,
            },
        )
        .map_err(|_| Error::DecryptionFailed)?;

    if plaintext.len() != 4 {
        return Err(Error::MalformedVote);
    }
    let mut index = [0u8; 4];
    index.copy_from_slice(&plaintext);

    Ok(u32::from_be_bytes(index) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_secret() -> SharedSecret {
        let (a, _) = generate_a(&random_bytes()).unwrap();
        let (_, b_public) = generate_a(&random_bytes()).unwrap();
        generate_ab(&a, &b_public)
    }

    #[test]
    fn test_vote_round_trip() {
        let election = Identifier::new_for_election();
        let secret = edge_secret();
        let alice = VoterId([1; 32]);
        let bob = VoterId([2; 32]);

        let ciphertext = encrypt_vote(&secret, election, &alice, &bob, 2).unwrap();
        assert_eq!(ciphertext.len(), NONCE_LENGTH + 4 + TAG_LENGTH);
        assert_eq!(decrypt_vote(&secret, election, &alice, &bob, &ciphertext).unwrap(), 2);

        // Fresh nonce on every encryption
        let again = encrypt_vote(&secret, election, &alice, &bob, 2).unwrap();
        assert_ne!(ciphertext, again);
    }

    #[test]
    fn test_ciphertext_privacy() {
        let election = Identifier::new_for_election();
        let secret = edge_secret();
        let alice = VoterId([1; 32]);
        let bob = VoterId([2; 32]);
        let ciphertext = encrypt_vote(&secret, election, &alice, &bob, 0).unwrap();

        // Any other edge secret fails
        for _ in 0..10 {
            let other = edge_secret();
            assert!(matches!(
                decrypt_vote(&other, election, &alice, &bob, &ciphertext),
                Err(Error::DecryptionFailed)
            ));
        }

        // So does the reverse direction, another election, or a flipped bit
        assert!(decrypt_vote(&secret, election, &bob, &alice, &ciphertext).is_err());
        assert!(
            decrypt_vote(&secret, Identifier::new_for_election(), &alice, &bob, &ciphertext)
                .is_err()
        );
        let mut tampered = ciphertext.clone();
        tampered[NONCE_LENGTH] ^= 1;
        assert!(decrypt_vote(&secret, election, &alice, &bob, &tampered).is_err());

        assert!(matches!(
            decrypt_vote(&secret, election, &alice, &bob, &ciphertext[..10]),
            Err(Error::DecryptionFailed)
        ));
    }
}

use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use rand::Rng;

pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let mut csprng = rand::rngs::OsRng {};
    let Keypair { public, secret } = Keypair::generate(&mut csprng);
    (secret, public)
}

/// 32 bytes from the operating system's RNG, used for local seeds and commit values.
pub fn random_bytes() -> [u8; 32] {
    let mut csprng = rand::rngs::OsRng {};
    csprng.gen()
}

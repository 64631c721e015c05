//! Privacy-preserving group voting over a shared, publicly readable, transaction-ordered ledger.
//!
//! Voters are shuffled into near-equal groups using a seed produced by a commit-reveal randomness
//! beacon (plus one value from an external oracle). Inside a group every pair of voters runs an
//! X25519 key exchange, exchanges AES-GCM encrypted votes, and each voter broadcasts the totals of
//! its group. Anyone can then fold the group totals into a global result.
//!
//! Every participant call is a [`Signed`] transaction, validated against a [`Store`] before it is
//! appended. Only the private key-exchange values and the votes themselves stay with the
//! participant (see [`Voter`]).

#[macro_use]
extern crate serde;

mod authority;
mod beacon;
mod commitment;
mod distribution;
mod election;
mod error;
mod key_exchange;
mod oracle;
mod phase;
mod registration;
mod serde_hex;
mod shuffle;
mod store;
mod tally;
mod transaction;
mod util;
mod vote;
mod vote_cipher;
mod voter;

pub use authority::*;
pub use beacon::*;
pub use commitment::*;
pub use distribution::*;
pub use election::*;
pub use error::*;
pub use key_exchange::*;
pub use oracle::*;
pub use phase::*;
pub use registration::*;
pub use serde_hex::*;
pub use shuffle::*;
pub use store::*;
pub use tally::*;
pub use transaction::*;
pub use util::*;
pub use vote::*;
pub use vote_cipher::*;
pub use voter::*;

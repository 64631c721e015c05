/// Protocol phase of an election, derived from which authority transactions are on the ledger.
///
/// Phases only move forward: `Registration → Commit → Reveal → Distributed`.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElectionPhase {
    /// Voters may register.
    Registration,
    /// Voters may commit to their beacon contribution.
    Commit,
    /// Voters reveal their beacon contribution.
    Reveal,
    /// Groups are fixed; key exchange, vote exchange and group totals happen here.
    Distributed,
}

impl std::fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ElectionPhase::Registration => "registration",
            ElectionPhase::Commit => "commit",
            ElectionPhase::Reveal => "reveal",
            ElectionPhase::Distributed => "distributed",
        };
        write!(f, "{}", name)
    }
}

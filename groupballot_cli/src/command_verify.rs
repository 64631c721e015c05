use crate::command_simulate::print_tally;
use anyhow::{anyhow, bail, Context, Result};
use content_inspector::ContentType;
use groupballot::*;

pub fn command_verify(matches: &clap::ArgMatches) -> Result<()> {
    let filename = matches
        .value_of("INPUT")
        .ok_or_else(|| anyhow!("input filename required"))?;

    let file_bytes =
        std::fs::read(filename).with_context(|| format!("unable to read {}", filename))?;
    let transactions = parse_ledger(&file_bytes).with_context(|| format!("unable to read {}", filename))?;

    let (store, election_id) = replay(transactions)?;
    println!("> Election verified OK");

    let phase = store.get_phase(election_id)?;
    println!("> Election {} is in phase {}", election_id, phase);

    if matches.is_present("print-groups") {
        let grouping = Grouping::load(&store, election_id)?;
        println!("Groups:");
        for (index, members) in grouping.groups().iter().enumerate() {
            println!("  group {}:", index);
            for member in members {
                println!("    {}", member);
            }
        }
    }

    if matches.is_present("print-tally") {
        let election = store.get_election(election_id)?;
        let tally = calculate_totals(&store, election_id)?;
        println!("Group totals:");
        for (index, totals) in tally.group_totals.iter().enumerate() {
            println!("  group {}: {:?}", index, totals);
        }
        print_tally(&election, &tally);
    }

    Ok(())
}

/// Read a ledger in JSON or CBOR format
///
/// Short CBOR documents may carry no NUL byte, so text detection is confirmed with a UTF-8 check.
pub fn parse_ledger(bytes: &[u8]) -> Result<Vec<SignedTransaction>> {
    let transactions = match content_inspector::inspect(bytes) {
        ContentType::UTF_8 if std::str::from_utf8(bytes).is_ok() => serde_json::from_slice(bytes)?,
        ContentType::UTF_8 | ContentType::BINARY => serde_cbor::from_slice(bytes)?,
        _ => bail!("invalid file format"),
    };
    Ok(transactions)
}

/// Validate every transaction in order against a fresh store
pub fn replay(transactions: Vec<SignedTransaction>) -> Result<(MemStore, Identifier)> {
    let election_id = match transactions.first() {
        Some(tx) if tx.transaction_type() == TransactionType::Election => tx.id(),
        Some(_) => bail!("first transaction must be an election transaction"),
        None => bail!("no transactions present"),
    };

    let mut store = MemStore::default();
    for tx in transactions {
        let id = tx.id();
        store
            .apply(tx)
            .with_context(|| format!("failed to validate transaction {}", id))?;
    }

    Ok((store, election_id))
}

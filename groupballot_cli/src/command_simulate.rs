use crate::config::SimulationConfig;
use anyhow::{Context, Result};
use groupballot::*;
use log::info;
use rand::Rng;

pub fn command_simulate(matches: &clap::ArgMatches) -> Result<()> {
    let config = SimulationConfig::from_env()?.override_with(matches)?;
    config.validate()?;

    let store = simulate(&config)?;

    if let Some(filename) = matches.value_of("output") {
        let ledger: Vec<&SignedTransaction> = store.transactions().collect();
        let json = serde_json::to_string_pretty(&ledger)?;
        std::fs::write(filename, json)
            .with_context(|| format!("unable to write {}", filename))?;
        println!("> Ledger written to {}", filename);
    }

    Ok(())
}

/// Run a whole election with random votes and print its result
pub fn simulate(config: &SimulationConfig) -> Result<MemStore> {
    let mut rng = rand::thread_rng();
    let mut store = MemStore::default();

    let oracle = LocalOracle::new();
    let (authority, election) = Authority::create_election(
        config.options.clone(),
        OracleConfig::new(oracle.public_key(), config.oracle_budget),
    )?;
    let election_id = authority.election_id();
    store.apply(election.into())?;
    println!("> Election {}", election_id);

    // Registration
    let mut voters: Vec<Voter> = (0..config.voters).map(|_| Voter::new(election_id)).collect();
    for voter in &voters {
        store.apply(voter.register()?.into())?;
    }
    info!("{} voters registered", store.get_voter_count(election_id));

    // Randomness beacon
    store.apply(authority.start_commit_phase()?.into())?;
    for voter in voters.iter_mut() {
        store.apply(voter.commit()?.into())?;
    }

    let request = authority.request_random_number(&store)?;
    store.apply(request.clone().into())?;
    store.apply(oracle.answer(&request)?.into())?;

    store.apply(authority.start_reveal_phase()?.into())?;
    for voter in voters.iter() {
        store.apply(voter.reveal()?.into())?;
    }

    // Grouping
    store.apply(authority.distribute(&store, config.groups)?.into())?;
    let grouping = Grouping::load(&store, election_id)?;
    println!("> Group sizes: {:?}", grouping.sizes());

    // Key exchange
    for group in grouping.groups() {
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                let voter = find_voter(&voters, a)?;
                store.apply(voters[voter].deploy_edge(*b)?.into())?;
            }
        }
    }
    for voter in voters.iter_mut() {
        for peer in voter.group_peers(&store)? {
            let tx = voter.transmit_a(&store, peer)?;
            store.apply(tx.into())?;
        }
    }

    // Voting
    for voter in voters.iter_mut() {
        let option = rng.gen_range(0, config.options.len());
        voter.choose(&store, option)?;
    }
    for voter in voters.iter() {
        for peer in voter.group_peers(&store)? {
            store.apply(voter.send_vote(&store, peer)?.into())?;
        }
    }

    // Group totals
    for voter in voters.iter() {
        let tally = voter.tally_group(&store)?;
        store.apply(voter.broadcast_group_total(&tally)?.into())?;
    }

    let election = store.get_election(election_id)?;
    let tally = calculate_totals(&store, election_id)?;
    print_tally(&election, &tally);

    Ok(store)
}

fn find_voter(voters: &[Voter], id: &VoterId) -> Result<usize> {
    voters
        .iter()
        .position(|v| &v.id() == id)
        .with_context(|| format!("voter {} is not simulated", id))
}

pub fn print_tally(election: &ElectionTransaction, tally: &Tally) {
    println!("> Totals:");
    for (option, total) in election.options.iter().zip(tally.totals.iter()) {
        println!("  {} got {} votes", option, total);
    }
    if !tally.divergent_groups.is_empty() {
        println!("> Groups with diverging totals: {:?}", tally.divergent_groups);
    }
    match tally.winner_option(election) {
        Some(winner) => println!("> The winner is {}", winner),
        None => println!("> No winner"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate() {
        let config = SimulationConfig {
            voters: 7,
            groups: 2,
            options: vec!["red".to_owned(), "blue".to_owned()],
            oracle_budget: 1,
        };
        let store = simulate(&config).unwrap();

        let election = store
            .transactions()
            .next()
            .map(|tx| tx.id())
            .unwrap();
        let tally = calculate_totals(&store, election).unwrap();
        assert_eq!(tally.totals.iter().sum::<u64>(), 7);
        assert_eq!(tally.group_totals.len(), 2);
        assert!(tally.divergent_groups.is_empty());
    }
}

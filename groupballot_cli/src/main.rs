use clap::{App, Arg, SubCommand};
use log::LevelFilter;

mod command_simulate;
mod command_verify;
mod config;

use command_simulate::command_simulate;
use command_verify::command_verify;

fn main() {
    let matches = App::new("GroupBallot CLI")
        .version("0.1")
        .about("Runs and verifies group elections")
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("simulate")
                .about("Run a complete election in-process with simulated voters")
                .arg(
                    Arg::with_name("voters")
                        .long("voters")
                        .takes_value(true)
                        .help("Number of voters - can also be set with GROUPBALLOT_VOTERS"),
                )
                .arg(
                    Arg::with_name("groups")
                        .long("groups")
                        .takes_value(true)
                        .help("Number of groups - can also be set with GROUPBALLOT_GROUPS"),
                )
                .arg(
                    Arg::with_name("options")
                        .long("options")
                        .takes_value(true)
                        .help("Comma separated voting options - can also be set with GROUPBALLOT_OPTIONS"),
                )
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .help("Write the resulting ledger to a JSON file"),
                ),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Replay and validate a ledger file")
                .arg(
                    Arg::with_name("INPUT")
                        .index(1)
                        .required(true)
                        .help("Ledger file in JSON or CBOR format"),
                )
                .arg(
                    Arg::with_name("print-groups")
                        .long("print-groups")
                        .help("Print the members of every group"),
                )
                .arg(
                    Arg::with_name("print-tally")
                        .long("print-tally")
                        .help("Print the group totals and the result"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = if let Some(matches) = matches.subcommand_matches("simulate") {
        command_simulate(matches)
    } else if let Some(matches) = matches.subcommand_matches("verify") {
        command_verify(matches)
    } else {
        eprintln!("{}", matches.usage());
        std::process::exit(1);
    };

    if let Err(e) = result {
        eprintln!("groupballot: {:#}", e);
        std::process::exit(1);
    }
}

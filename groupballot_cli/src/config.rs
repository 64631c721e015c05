use anyhow::{bail, Context, Result};
use std::env::var;

pub const DEFAULT_VOTERS: usize = 12;
pub const DEFAULT_GROUPS: u32 = 3;
pub const DEFAULT_OPTIONS: &str = "yes,no,abstain";
pub const DEFAULT_ORACLE_BUDGET: u32 = 1;

/// Settings for a simulated election
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub voters: usize,
    pub groups: u32,
    pub options: Vec<String>,
    pub oracle_budget: u32,
}

impl SimulationConfig {
    pub fn from_env() -> Result<Self> {
        let voters = match var("GROUPBALLOT_VOTERS") {
            Ok(val) => parse_number(&val).context("GROUPBALLOT_VOTERS")?,
            Err(_e) => DEFAULT_VOTERS,
        };

        let groups = match var("GROUPBALLOT_GROUPS") {
            Ok(val) => parse_number(&val).context("GROUPBALLOT_GROUPS")?,
            Err(_e) => DEFAULT_GROUPS,
        };

        let options = match var("GROUPBALLOT_OPTIONS") {
            Ok(val) => parse_options(&val).context("GROUPBALLOT_OPTIONS")?,
            Err(_e) => parse_options(DEFAULT_OPTIONS)?,
        };

        let oracle_budget = match var("GROUPBALLOT_ORACLE_BUDGET") {
            Ok(val) => parse_number(&val).context("GROUPBALLOT_ORACLE_BUDGET")?,
            Err(_e) => DEFAULT_ORACLE_BUDGET,
        };

        Ok(SimulationConfig {
            voters,
            groups,
            options,
            oracle_budget,
        })
    }

    /// Apply command-line flags on top of the environment
    pub fn override_with(mut self, matches: &clap::ArgMatches) -> Result<Self> {
        if let Some(val) = matches.value_of("voters") {
            self.voters = parse_number(val).context("--voters")?;
        }
        if let Some(val) = matches.value_of("groups") {
            self.groups = parse_number(val).context("--groups")?;
        }
        if let Some(val) = matches.value_of("options") {
            self.options = parse_options(val).context("--options")?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.groups == 0 || self.groups as usize > self.voters {
            bail!(
                "cannot split {} voters into {} groups",
                self.voters,
                self.groups
            );
        }
        if self.oracle_budget == 0 {
            bail!("the oracle budget must cover at least one request");
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(val: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    val.trim()
        .parse()
        .with_context(|| format!("invalid number {:?}", val))
}

fn parse_options(val: &str) -> Result<Vec<String>> {
    let options: Vec<String> = val
        .split(',')
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| o.to_owned())
        .collect();

    if options.is_empty() {
        bail!("at least one voting option is required");
    }
    Ok(options)
}

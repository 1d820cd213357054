use clap::Subcommand;
use deeprest_core::Config;

use super::{open_database, print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
}

pub fn run(action: StatsAction) -> CliResult {
    let db = open_database(&Config::load_or_default())?;

    match action {
        StatsAction::Today => {
            print_json(&db.stats_today()?)?;
        }
        StatsAction::All => {
            print_json(&db.stats_all()?)?;
        }
    }
    Ok(())
}

use clap::Subcommand;
use deeprest_core::storage::SessionStore;
use deeprest_core::{Config, Tag};

use super::{open_database, print_json, CliResult};

#[derive(Subcommand)]
pub enum TagAction {
    /// Create a new tag
    Create {
        /// Tag name
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// List all tags
    List,
}

pub fn run(action: TagAction) -> CliResult {
    let mut db = open_database(&Config::load_or_default())?;

    match action {
        TagAction::Create { name, color } => {
            let mut tag = Tag::new(name);
            tag.color = color;
            db.upsert_tag(&tag)?;
            print_json(&tag)?;
        }
        TagAction::List => {
            print_json(&db.list_tags()?)?;
        }
    }
    Ok(())
}

//! Project management commands for CLI.

use clap::Subcommand;
use deeprest_core::storage::SessionStore;
use deeprest_core::{Config, CoreError, Project};

use super::{open_database, print_json, CliResult};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a new project
    Create {
        /// Project name
        name: String,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        /// Display color, e.g. "#3b82f6"
        #[arg(long)]
        color: Option<String>,
    },
    /// List all projects
    List,
    /// Rename a project
    Rename {
        /// Project ID
        id: String,
        /// New name
        name: String,
    },
    /// Delete a project. Recorded sessions keep the reference.
    Delete {
        /// Project ID
        id: String,
    },
}

pub fn run(action: ProjectAction) -> CliResult {
    let mut db = open_database(&Config::load_or_default())?;

    match action {
        ProjectAction::Create {
            name,
            goal,
            icon,
            color,
        } => {
            let mut project = Project::new(name);
            project.goal = goal;
            project.icon = icon;
            project.color = color;
            db.upsert_project(&project)?;
            print_json(&project)?;
        }
        ProjectAction::List => {
            print_json(&db.list_projects()?)?;
        }
        ProjectAction::Rename { id, name } => {
            let mut project = db
                .get_project(&id)?
                .ok_or_else(|| not_found(&id))?;
            project.rename(name);
            db.upsert_project(&project)?;
            print_json(&project)?;
        }
        ProjectAction::Delete { id } => {
            if !db.delete_project(&id)? {
                return Err(not_found(&id));
            }
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
    }
    Ok(())
}

fn not_found(id: &str) -> CoreError {
    CoreError::Custom(format!("project not found: {id}"))
}

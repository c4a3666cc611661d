//! `reposync profile add|list|edit|remove`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use reposync_core::{profiles, types::strip_userinfo};

use super::home_dir;

/// Manage stored sync profiles.
#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Store a new destination repository.
    Add(AddArgs),

    /// List stored profiles. Tokens are never shown.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Change the name, repository or token of a profile.
    Edit(EditArgs),

    /// Delete a profile by name or id.
    Remove {
        /// Profile name or id.
        key: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Unique profile name (e.g. "github", "backup").
    pub name: String,

    /// Remote repository URL.
    #[arg(long)]
    pub repo: String,

    /// Access token used to push.
    #[arg(long, env = "REPOSYNC_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("changes")
        .args(["name", "repo", "token"])
        .required(true)
        .multiple(true)
))]
pub struct EditArgs {
    /// Profile name or id.
    pub key: String,

    /// New profile name.
    #[arg(long)]
    pub name: Option<String>,

    /// New remote repository URL.
    #[arg(long)]
    pub repo: Option<String>,

    /// Replacement access token.
    #[arg(long)]
    pub token: Option<String>,
}

pub fn run(cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Add(args) => add(args),
        ProfileCommand::List { json } => list(json),
        ProfileCommand::Edit(args) => edit(args),
        ProfileCommand::Remove { key } => remove(&key),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home_dir()?;
    let record = profiles::add_at(&home, &args.name, &args.repo, &args.token)
        .with_context(|| format!("failed to add profile '{}'", args.name))?;
    println!(
        "✓ Added profile '{}' ({}) -> {}",
        record.name,
        record.id,
        strip_userinfo(&record.repository_url)
    );
    Ok(())
}

#[derive(Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "updated")]
    updated_at: String,
}

fn list(json: bool) -> Result<()> {
    let home = home_dir()?;
    let store = profiles::load_at(&home).context("failed to load profiles")?;

    let rows: Vec<ProfileRow> = store
        .profiles
        .iter()
        .map(|p| ProfileRow {
            id: p.id.to_string(),
            name: p.name.clone(),
            repository: strip_userinfo(&p.repository_url),
            updated_at: p.updated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        })
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("failed to serialize profiles")?
        );
        return Ok(());
    }

    if rows.is_empty() {
        println!("No profiles configured.");
        println!("Run: reposync profile add <name> --repo <url> --token <token>");
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn edit(args: EditArgs) -> Result<()> {
    let home = home_dir()?;
    let update = profiles::ProfileUpdate {
        name: args.name.as_deref(),
        repository_url: args.repo.as_deref(),
        token: args.token.as_deref(),
    };
    let record = profiles::update_at(&home, &args.key, update)
        .with_context(|| format!("failed to edit profile '{}'", args.key))?;
    println!(
        "✓ Updated profile '{}' ({}) -> {}",
        record.name,
        record.id,
        strip_userinfo(&record.repository_url)
    );
    if args.token.is_some() {
        println!("  Token replaced.");
    }
    Ok(())
}

fn remove(key: &str) -> Result<()> {
    let home = home_dir()?;
    let removed = profiles::remove_at(&home, key)
        .with_context(|| format!("failed to remove profile '{key}'"))?;
    println!("✓ Removed profile '{}' ({})", removed.name, removed.id);
    Ok(())
}

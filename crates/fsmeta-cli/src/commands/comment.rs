//! Comment commands - read and write Finder comments.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args as ClapArgs, Subcommand};
use tracing::instrument;

use fsmeta_core::FinderComments;

use crate::config::Config;

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Print the Finder comment of a file (empty if none)
    Get(GetArgs),

    /// Set the Finder comment of a file, or clear it when COMMENT is omitted
    Set(SetArgs),
}

#[derive(ClapArgs, Clone)]
pub struct GetArgs {
    /// File to read the comment from
    pub path: PathBuf,
}

#[derive(ClapArgs, Clone)]
pub struct SetArgs {
    /// File to comment
    pub path: PathBuf,

    /// New comment text
    pub comment: Option<String>,
}

pub fn execute(command: &Command, config: &Config) -> Result<()> {
    let comments = FinderComments::new(config.script.bridge());
    match command {
        Command::Get(args) => get(&comments, args),
        Command::Set(args) => set(&comments, args),
    }
}

#[instrument(level = "info", name = "cmd::comment::get", skip_all)]
fn get(comments: &FinderComments, args: &GetArgs) -> Result<()> {
    let comment = comments.get(&args.path)?;
    println!("{comment}");
    Ok(())
}

#[instrument(level = "info", name = "cmd::comment::set", skip_all)]
fn set(comments: &FinderComments, args: &SetArgs) -> Result<()> {
    comments.set(&args.path, args.comment.as_deref())?;
    tracing::info!(path = %args.path.display(), "comment updated");
    Ok(())
}

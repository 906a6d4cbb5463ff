#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::Result;
use clap::{ColorChoice, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fsmeta_core::{FinderCommentError, VolumeError, XattrError};

use crate::commands::{comment, completions, volumes, xattr};
use crate::config::Config;

/// Inspect extended attributes, mounted volumes and Finder comments
#[derive(Parser)]
#[command(name = "fsmeta")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Show an attribute, hex-dumped if it is binary
    fsmeta xattr get ~/Downloads/file.zip com.apple.quarantine

    # Every attribute with its value
    fsmeta xattr list --long ~/Downloads/file.zip

    # Mounted volumes as JSON
    fsmeta volumes --json

    # Finder comment (macOS)
    fsmeta comment set ~/notes.txt \"reviewed\"
")]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// When to use colored output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read, list, write and remove extended attributes
    #[command(subcommand)]
    Xattr(xattr::Command),

    /// List mounted volumes
    Volumes(volumes::Args),

    /// Read or write Finder comments (macOS)
    #[command(subcommand)]
    Comment(comment::Command),

    /// Generate shell completions
    Completions(completions::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // Set up tracing based on verbosity (skip if quiet)
    if !cli.quiet {
        let verbose = if cli.verbose > 0 {
            cli.verbose
        } else {
            config.defaults.verbosity.unwrap_or(0)
        };
        setup_tracing(verbose, cli.color);
    }

    match cli.command {
        Commands::Xattr(command) => xattr::execute(&command, &config),
        Commands::Volumes(args) => volumes::execute(&args, &config),
        Commands::Comment(command) => comment::execute(&command, &config),
        Commands::Completions(args) => completions::execute(&args),
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8, color: ColorChoice) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let ansi = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_terminal(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
///
/// This approach is more robust than string matching because it doesn't depend
/// on error message wording, which could change between versions.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(xattr_err) = cause.downcast_ref::<XattrError>() {
            match xattr_err {
                XattrError::Unsupported { .. } => return exit_code::UNSUPPORTED,
                XattrError::Io { source, .. } => {
                    if let Some(code) = io_exit_code(source) {
                        return code;
                    }
                }
                XattrError::UnknownOption(_) => return exit_code::USAGE_ERROR,
                XattrError::InvalidArgument(_) => {}
            }
        }

        // Finder failures carry only a description, so they get their own code
        if let Some(finder_err) = cause.downcast_ref::<FinderCommentError>() {
            tracing::debug!(caller = %finder_err.caller(), "Finder comment error");
            return exit_code::SCRIPT_FAILED;
        }

        if cause.downcast_ref::<VolumeError>().is_some() {
            return exit_code::GENERAL_ERROR;
        }

        // Generic I/O errors
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && let Some(code) = io_exit_code(io_err)
        {
            return code;
        }
    }

    // Fallback to string matching for errors we don't have typed variants for
    let msg = format!("{e:#}").to_lowercase();
    if msg.contains("cancelled") || msg.contains("interrupted") {
        exit_code::CANCELLED
    } else {
        exit_code::GENERAL_ERROR
    }
}

fn io_exit_code(err: &io::Error) -> Option<u8> {
    match err.kind() {
        io::ErrorKind::PermissionDenied => Some(exit_code::PERMISSION_DENIED),
        io::ErrorKind::NotFound => Some(exit_code::NOT_FOUND),
        io::ErrorKind::Interrupted => Some(exit_code::CANCELLED),
        io::ErrorKind::Unsupported => Some(exit_code::UNSUPPORTED),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_not_found_through_context() {
        let err = Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "no such attribute"))
            .context("Failed to read attribute")
            .unwrap_err();
        assert_eq!(categorize_error(&err), exit_code::NOT_FOUND);
    }

    #[test]
    fn test_categorize_xattr_errors() {
        let err = anyhow::Error::new(XattrError::Unsupported {
            path: "/proc/self".into(),
        });
        assert_eq!(categorize_error(&err), exit_code::UNSUPPORTED);

        let err = anyhow::Error::new(XattrError::Io {
            op: "getxattr",
            path: "/root/secret".into(),
            name: Some("user.x".into()),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(categorize_error(&err), exit_code::PERMISSION_DENIED);

        let err = anyhow::Error::new(XattrError::UnknownOption("bogus".into()));
        assert_eq!(categorize_error(&err), exit_code::USAGE_ERROR);

        let err = anyhow::Error::new(XattrError::InvalidArgument("user.a\\0b".into()));
        assert_eq!(categorize_error(&err), exit_code::GENERAL_ERROR);
    }

    #[test]
    fn test_categorize_fallback() {
        assert_eq!(
            categorize_error(&anyhow::anyhow!("operation cancelled by user")),
            exit_code::CANCELLED
        );
        assert_eq!(
            categorize_error(&anyhow::anyhow!("something odd")),
            exit_code::GENERAL_ERROR
        );
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from(["fsmeta", "xattr", "get", "/tmp/f", "user.x"]).unwrap();
        assert!(matches!(cli.command, Commands::Xattr(xattr::Command::Get(_))));

        let cli = Cli::try_parse_from(["fsmeta", "-vv", "comment", "set", "/tmp/f"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Comment(comment::Command::Set(_))));
    }

    #[test]
    fn test_cli_rejects_conflicting_set_flags() {
        let result = Cli::try_parse_from([
            "fsmeta", "xattr", "set", "/tmp/f", "user.x", "v", "--create", "--replace",
        ]);
        assert!(result.is_err());
    }
}

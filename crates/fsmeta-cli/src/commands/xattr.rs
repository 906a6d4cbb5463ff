//! Xattr commands - read, list, write and remove extended attributes.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Subcommand};
use tracing::instrument;

use fsmeta_core::xattr::{self, AttrValue};
use fsmeta_core::{
    utf8, xattr_get_human_readable, NativeXattr, ReadableValue, XattrOptions, XattrReader,
};

use crate::config::Config;

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Print one attribute, hex-dumped if it is not UTF-8
    Get(GetArgs),

    /// List the attributes of a file
    List(ListArgs),

    /// Write an attribute
    Set(SetArgs),

    /// Remove an attribute
    Rm(RmArgs),
}

#[derive(ClapArgs, Clone)]
pub struct GetArgs {
    /// File to read from
    pub path: PathBuf,

    /// Attribute name
    pub name: String,

    #[command(flatten)]
    pub flags: FlagArgs,

    /// Expose HFS+ compression attributes (macOS)
    #[arg(long)]
    pub show_compression: bool,

    /// Byte offset to start reading at
    #[arg(long, default_value_t = 0)]
    pub position: u32,

    /// Write the raw bytes without any formatting
    #[arg(long)]
    pub raw: bool,
}

#[derive(ClapArgs, Clone)]
pub struct ListArgs {
    /// File to list
    pub path: PathBuf,

    /// Show values as well as names
    #[arg(short, long)]
    pub long: bool,

    #[command(flatten)]
    pub flags: FlagArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Clone)]
pub struct SetArgs {
    /// File to write to
    pub path: PathBuf,

    /// Attribute name
    pub name: String,

    /// Attribute value
    pub value: String,

    /// Fail if the attribute already exists
    #[arg(long, conflicts_with = "replace")]
    pub create: bool,

    /// Fail if the attribute does not exist
    #[arg(long)]
    pub replace: bool,

    #[command(flatten)]
    pub flags: FlagArgs,
}

#[derive(ClapArgs, Clone)]
pub struct RmArgs {
    /// File to remove from
    pub path: PathBuf,

    /// Attribute name
    pub name: String,

    #[command(flatten)]
    pub flags: FlagArgs,
}

/// Flags shared by every xattr command.
#[derive(ClapArgs, Clone)]
pub struct FlagArgs {
    /// Act on a symlink itself rather than its target
    #[arg(long)]
    pub no_follow: bool,

    /// Attribute flag by name: nofollow, showcompression, createonly, replaceonly
    #[arg(short = 'o', long = "option", value_name = "FLAG")]
    pub options: Vec<String>,
}

impl FlagArgs {
    /// Parse the named flags and fold in `--no-follow`.
    pub fn resolve(&self) -> Result<XattrOptions> {
        let mut options = XattrOptions::from_names(self.options.iter().map(String::as_str))?;
        options.no_follow |= self.no_follow;
        Ok(options)
    }
}

pub fn execute(command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Get(args) => get(args),
        Command::List(args) => list(args, config.defaults.json.unwrap_or(false)),
        Command::Set(args) => set(args),
        Command::Rm(args) => rm(args),
    }
}

fn not_found(path: &Path, name: &str) -> anyhow::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{name}: no such attribute on {}", path.display()),
    )
    .into()
}

#[instrument(level = "info", name = "cmd::xattr::get", skip_all)]
fn get(args: &GetArgs) -> Result<()> {
    let mut options = args.flags.resolve()?;
    options.show_compression |= args.show_compression;
    let context = || format!("Failed to read {} from {}", args.name, args.path.display());

    if args.raw {
        let value = xattr::get(&args.path, &args.name, options, args.position)
            .with_context(context)?;
        return match value {
            AttrValue::Data(bytes) => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
                Ok(())
            }
            AttrValue::Present => Ok(()),
            AttrValue::Absent => Err(not_found(&args.path, &args.name)),
        };
    }

    match xattr_get_human_readable(&args.path, &args.name, options, args.position)
        .with_context(context)?
    {
        ReadableValue::Text(text) => println!("{text}"),
        ReadableValue::Present => println!("true"),
        ReadableValue::Absent => return Err(not_found(&args.path, &args.name)),
    }
    Ok(())
}

#[instrument(level = "info", name = "cmd::xattr::list", skip_all)]
fn list(args: &ListArgs, default_json: bool) -> Result<()> {
    let options = args.flags.resolve()?;
    let context = || format!("Failed to list attributes of {}", args.path.display());

    if args.json || default_json {
        let json = if args.long {
            let values = XattrReader::new(NativeXattr)
                .read_all(&args.path, options)
                .with_context(context)?;
            let map: serde_json::Map<String, serde_json::Value> = values
                .into_iter()
                .map(|(name, value)| -> Result<_> { Ok((name, serde_json::to_value(value)?)) })
                .collect::<Result<_>>()?;
            serde_json::Value::Object(map)
        } else {
            serde_json::to_value(xattr::list(&args.path, options).with_context(context)?)?
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let names = xattr::list(&args.path, options).with_context(context)?;
    if !args.long {
        for name in &names {
            println!("{name}");
        }
        return Ok(());
    }

    // `xattr -l` layout: text inline, binary as a hex dump on the following lines
    for name in &names {
        let value = xattr::get(&args.path, name, options, 0)
            .with_context(|| format!("Failed to read {name} from {}", args.path.display()))?;
        match value {
            AttrValue::Data(bytes) => match utf8::decode(bytes) {
                Ok(text) => println!("{name}: {text}"),
                Err(bytes) => println!("{name}:\n{}", utf8::hex_dump(&bytes)),
            },
            AttrValue::Present => println!("{name}: "),
            // Removed since the listing
            AttrValue::Absent => tracing::debug!(name, "attribute vanished"),
        }
    }
    Ok(())
}

#[instrument(level = "info", name = "cmd::xattr::set", skip_all)]
fn set(args: &SetArgs) -> Result<()> {
    let mut options = args.flags.resolve()?;
    options.create_only |= args.create;
    options.replace_only |= args.replace;
    xattr::set(&args.path, &args.name, args.value.as_bytes(), options, 0)
        .with_context(|| format!("Failed to write {} on {}", args.name, args.path.display()))?;
    tracing::info!(path = %args.path.display(), name = %args.name, "attribute written");
    Ok(())
}

#[instrument(level = "info", name = "cmd::xattr::rm", skip_all)]
fn rm(args: &RmArgs) -> Result<()> {
    let options = args.flags.resolve()?;
    xattr::remove(&args.path, &args.name, options)
        .with_context(|| format!("Failed to remove {} from {}", args.name, args.path.display()))?;
    tracing::info!(path = %args.path.display(), name = %args.name, "attribute removed");
    Ok(())
}

//! Volumes command - list mounted volumes.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use comfy_table::{Cell, CellAlignment};
use tracing::instrument;

use fsmeta_core::{all_volumes, VolumeMap};

use crate::config::Config;
use crate::output::{create_table, format_flag, format_size};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Include hidden volumes (system, pseudo and nobrowse mounts)
    #[arg(long)]
    pub hidden: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::volumes", skip_all)]
pub fn execute(args: &Args, config: &Config) -> Result<()> {
    let show_hidden = args.hidden || config.defaults.show_hidden.unwrap_or(false);
    let volumes = all_volumes(show_hidden).context("Failed to enumerate volumes")?;

    if args.json || config.defaults.json.unwrap_or(false) {
        output_json(&volumes)
    } else {
        if volumes.is_empty() {
            eprintln!("No volumes.");
            return Ok(());
        }
        output_table(&volumes);
        Ok(())
    }
}

fn output_json(volumes: &VolumeMap) -> Result<()> {
    let keyed: BTreeMap<String, serde_json::Map<String, serde_json::Value>> = volumes
        .iter()
        .map(|(mountpoint, info)| (mountpoint.to_string_lossy().into_owned(), info.properties()))
        .collect();
    println!("{}", serde_json::to_string_pretty(&keyed)?);
    Ok(())
}

fn output_table(volumes: &VolumeMap) {
    let mut table = create_table();
    table.set_header(vec![
        "Mountpoint", "Name", "Format", "Size", "Available", "Local", "Read-only", "Removable",
    ]);

    for (mountpoint, info) in volumes {
        table.add_row(vec![
            Cell::new(mountpoint.display()),
            Cell::new(
                info.localized_name
                    .as_deref()
                    .or(info.name.as_deref())
                    .unwrap_or("-"),
            ),
            Cell::new(info.format.as_deref().unwrap_or("-")),
            size_cell(info.total_capacity),
            size_cell(info.available_capacity),
            Cell::new(format_flag(info.is_local)),
            Cell::new(format_flag(info.is_read_only)),
            Cell::new(format_flag(info.is_removable)),
        ]);
    }

    println!("{table}");
    eprintln!("{} volume(s)", volumes.len());
}

fn size_cell(bytes: Option<u64>) -> Cell {
    let text = bytes.map_or_else(|| "-".to_string(), format_size);
    Cell::new(text).set_alignment(CellAlignment::Right)
}


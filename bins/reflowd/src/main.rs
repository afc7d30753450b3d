// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reflow daemon (reflowd)
//!
//! Hosts the fleet simulation against the on-disk material store, and offers
//! one-shot operator commands (report, claim, complete, reset, list, stats)
//! against the same store.
#![allow(clippy::print_stdout)]

mod host;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use reflow_config_fs::FsConfigStore;
use reflow_core::{view, Identity, Material, MaterialRegistry, MaterialStats, Position};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding stored materials and prefs (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the fleet simulation and log every change until Ctrl-C
    Run {
        /// Stop on its own after this many seconds
        #[arg(long)]
        for_secs: Option<u64>,
        /// Start with the simulation disabled regardless of saved prefs
        #[arg(long)]
        paused: bool,
    },
    /// Print materials in registry order
    List {
        /// Only this material type
        #[arg(long = "type")]
        kind: Option<String>,
        /// Sort by creation time, newest first
        #[arg(long)]
        newest_first: bool,
        /// Emit the stored JSON records instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print dashboard counters
    Stats,
    /// Report a disposal
    Report {
        /// Material type, e.g. Plástico
        #[arg(long = "type")]
        kind: String,
        /// Free-form weight label
        #[arg(long, default_value = "A definir")]
        weight: String,
        /// Latitude; omitted means the default city coordinate
        #[arg(
            long,
            requires = "lng",
            allow_negative_numbers = true,
            value_parser = finite_degrees
        )]
        lat: Option<f64>,
        /// Longitude
        #[arg(
            long,
            requires = "lat",
            allow_negative_numbers = true,
            value_parser = finite_degrees
        )]
        lng: Option<f64>,
        /// Reporter id
        #[arg(long = "as", default_value = "cli")]
        reporter: String,
    },
    /// Claim an available material for a collector
    Claim {
        /// Material id
        id: String,
        /// Collector id
        #[arg(long)]
        collector: String,
    },
    /// Mark a material collected
    Complete {
        /// Material id
        id: String,
    },
    /// Restore the seed set and clear stored materials
    Reset,
}

/// Coordinates must be plain numbers: `NaN` and `inf` parse as `f64` but
/// cannot be stored.
fn finite_degrees(raw: &str) -> Result<f64, String> {
    let value = raw.parse::<f64>().map_err(|err| err.to_string())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("`{raw}` is not a finite coordinate"))
    }
}

fn open_store(data_dir: Option<PathBuf>) -> Result<FsConfigStore> {
    let store = match data_dir {
        Some(dir) => FsConfigStore::with_base(dir)?,
        None => FsConfigStore::new()?,
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = open_store(cli.data_dir)?;

    match cli.command {
        Command::Run { for_secs, paused } => host::run(store, for_secs, paused).await?,
        Command::List {
            kind,
            newest_first,
            json,
        } => {
            let registry = MaterialRegistry::restore(store);
            let mut rows = registry.list();
            if let Some(kind) = kind.as_deref() {
                rows = view::of_type(&rows, kind).cloned().collect();
            }
            if newest_first {
                rows = view::newest_first(&rows);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", material_table(&rows));
            }
        }
        Command::Stats => {
            let registry = MaterialRegistry::restore(store);
            let materials = registry.list();
            let stats = MaterialStats::from_materials(&materials);
            println!("total: {}", stats.total);
            println!("available: {}", stats.available);
            println!("in_transit: {}", stats.in_transit);
            println!("collected: {}", stats.collected);
            for (collector, ids) in view::collector_index(&materials) {
                println!("collector {collector}: {}", ids.join(", "));
            }
        }
        Command::Report {
            kind,
            weight,
            lat,
            lng,
            reporter,
        } => {
            let registry = MaterialRegistry::restore(store);
            let location = lat.zip(lng).map(|(lat, lng)| Position::new(lat, lng));
            let identity = Identity::new(reporter, "cli", None);
            let material = registry.report(&identity, kind, weight, location);
            println!("{}", material.id);
        }
        Command::Claim { id, collector } => {
            let registry = MaterialRegistry::restore(store);
            let outcome = if registry.claim(&id, collector) {
                "claimed"
            } else {
                "unchanged"
            };
            println!("{outcome}");
        }
        Command::Complete { id } => {
            let registry = MaterialRegistry::restore(store);
            let outcome = if registry.complete(&id) {
                "collected"
            } else {
                "unchanged"
            };
            println!("{outcome}");
        }
        Command::Reset => {
            MaterialRegistry::restore(store).reset();
            println!("reset");
        }
    }

    Ok(())
}

fn material_table(rows: &[Material]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "id",
        "type",
        "weight",
        "lat",
        "lng",
        "status",
        "generator",
        "collector",
        "created",
    ]);
    for m in rows {
        table.add_row(vec![
            m.id.clone(),
            m.kind.clone(),
            m.weight.clone(),
            format!("{:.5}", m.position.lat),
            format!("{:.5}", m.position.lng),
            m.status.to_string(),
            m.generator_id.clone().unwrap_or_default(),
            m.collector_id.clone().unwrap_or_default(),
            m.created_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| m.created_at.to_string()),
        ]);
    }
    table
}

//! Conduit CLI.
//!
//! - `conduit tick-speed <mode> [value]` - set how often transfers run
//! - `conduit demo` - run the built-in world headless
//! - `conduit fluids` - list fluid container items

mod demo;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use conduit_core::config::NetworkConfig;
use conduit_core::script::{ScriptEvent, ScriptEventBus, channels};
use conduit_core::tick::TickRate;
use conduit_data::{FluidRegistry, load_config};

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Item, fluid and energy pipe networks", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the transfer tick speed and print the broadcast event
    TickSpeed {
        /// lowest, low, normal, fast, fastest or custom
        mode: String,

        /// Ticks between passes, for `custom`
        value: Option<u32>,
    },

    /// Run the demo world headless
    Demo {
        /// Number of game ticks to simulate
        #[arg(long, default_value_t = 200)]
        ticks: u64,

        /// Config file (.ron, .toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List fluid container items
    Fluids {
        /// Extra definitions as a JSON array or object
        #[arg(long)]
        register: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::TickSpeed { mode, value } => tick_speed(&mode, value),
        Commands::Demo { ticks, config } => run_demo(ticks, config),
        Commands::Fluids { register } => list_fluids(register),
    }
}

fn tick_speed(mode: &str, value: Option<u32>) -> Result<()> {
    let rate = TickRate::from_mode(mode, value).with_context(|| format!("invalid tick speed {mode:?}"))?;
    let mut bus = ScriptEventBus::new();
    rate.apply(&mut bus);
    for event in bus.drain() {
        println!("{} {}", event.channel, event.payload);
    }
    Ok(())
}

fn run_demo(ticks: u64, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => load_config(&path).with_context(|| format!("loading {}", path.display()))?,
        None => NetworkConfig::default(),
    };
    let report = demo::run(config, ticks);
    let (items, fluid, energy) = report.totals();
    println!(
        "{} passes, {} events: moved {items} items, {fluid} mB, {energy} energy",
        report.passes.len(),
        report.events_delivered
    );
    Ok(())
}

fn list_fluids(register: Option<String>) -> Result<()> {
    let mut registry = FluidRegistry::with_defaults();
    if let Some(payload) = register {
        serde_json::from_str::<serde_json::Value>(&payload).context("--register is not valid JSON")?;
        let event = ScriptEvent::new(channels::REGISTER_FLUID_CONTAINER, payload);
        let added = registry.handle_script_event(&event).unwrap_or(0);
        println!("registered {added} container item(s)");
    }
    for (id, def) in registry.containers() {
        let output = def.output.as_deref().unwrap_or("-");
        println!("{id}: {} mB {} -> {output}", def.amount, def.fluid);
    }
    Ok(())
}

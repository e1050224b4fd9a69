#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for validating Flag War configuration and running a
//! scripted skirmish against an in-memory server.

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flag_war_core::{memory::MemoryHost, BlockPos, Cell, Event, NationId, PlayerName, TownId};
use flag_war_plugin::{FlagWar, FlagWarConfig, HostNotification, Response, MIN_HOST_VERSION};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Flag War territory conquest engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Parse and validate a configuration file
    Check {
        /// Path to the TOML configuration file
        #[arg(long)]
        config: PathBuf,
    },
    /// Play out one attack between two towns
    Demo {
        /// Optional TOML configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Town domain version reported to the engine
        #[arg(long, default_value = MIN_HOST_VERSION)]
        host_version: String,
        /// Seconds simulated per tick
        #[arg(long, default_value_t = 60)]
        tick_secs: u64,
        /// Break the flag timer after this many ticks instead of waiting out the attack
        #[arg(long)]
        defend_after: Option<u32>,
    },
}

/// Entry point for the Flag War command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Args::parse().command {
        Mode::Check { config } => check(config),
        Mode::Demo {
            config,
            host_version,
            tick_secs,
            defend_after,
        } => demo(config, &host_version, tick_secs, defend_after),
    }
}

fn load(path: &PathBuf) -> Result<FlagWarConfig> {
    FlagWarConfig::from_file(path)
        .with_context(|| format!("failed to load config at {}", path.display()))
}

fn check(path: PathBuf) -> Result<()> {
    let config = load(&path)?;
    let rules = config.attack_rules();
    println!(
        "{}: cells of {} blocks, {} flags per player, attacks last {}s",
        path.display(),
        rules.cell_size,
        rules.max_active_flags_per_player,
        rules.attack_duration.as_secs()
    );
    Ok(())
}

fn demo(
    config: Option<PathBuf>,
    host_version: &str,
    tick_secs: u64,
    defend_after: Option<u32>,
) -> Result<()> {
    if tick_secs == 0 {
        bail!("tick length must be at least one second");
    }
    let config = match &config {
        Some(path) => load(path)?,
        None => FlagWarConfig::default(),
    };
    let mut plugin = FlagWar::start(&config, host_version, skirmish_host())
        .context("flag war refused to start")?;
    let rules = plugin.rules().clone();
    let cell_size = i32::try_from(rules.cell_size).context("cell size too large")?;

    let attacker = PlayerName::new("Ayla");
    let flag_base = BlockPos::new("world", 10 * cell_size + 3, 64, 3);
    let response = plugin.handle(HostNotification::BlockPlaced {
        player: attacker.clone(),
        pos: flag_base.clone(),
        material: rules.flag.base.clone(),
    });
    if response == Response::Deny {
        let reason = plugin
            .host()
            .messages()
            .last()
            .map(|(_, message)| message.clone())
            .unwrap_or_default();
        bail!("attack was rejected: {reason}");
    }
    let cell = Cell::containing(&flag_base, rules.cell_size);
    info!(%cell, %attacker, "flag planted");

    let mut ticks = 0_u32;
    while plugin.is_cell_under_attack(&cell) {
        if defend_after == Some(ticks) {
            let timer = flag_base.offset(0, 1, 0);
            let material = plugin
                .host()
                .block_at(&timer)
                .cloned()
                .context("flag timer is missing")?;
            let _ = plugin.handle(HostNotification::BlockBroken {
                player: Some(PlayerName::new("Cato")),
                pos: timer,
                material,
            });
        }
        for event in plugin.tick(Duration::from_secs(tick_secs)) {
            report(&event);
        }
        ticks += 1;
    }

    let host = plugin.shutdown();
    for event in host.events() {
        if let Event::AttackDefended { defender, .. } = event {
            println!(
                "defended by {}",
                defender
                    .as_ref()
                    .map_or_else(|| "nobody".to_owned(), ToString::to_string)
            );
        }
    }
    for line in host.broadcasts() {
        println!("broadcast: {line}");
    }
    Ok(())
}

fn report(event: &Event) {
    match event {
        Event::CountdownAdvanced {
            cell,
            phase,
            remaining,
        } => println!("{cell}: phase {phase}, {}s left", remaining.as_secs()),
        Event::AttackWon { cell, attacker } => println!("{cell}: captured by {attacker}"),
        _ => {}
    }
}

/// Avalon of Albion eyes the land of Bastion of Borea.
fn skirmish_host() -> MemoryHost {
    let claims = |origin: i32| {
        (0..3).flat_map(move |dx| (0..3).map(move |dz| Cell::new("world", origin + dx, dz)))
    };
    let mut host = MemoryHost::new();
    let _ = host
        .add_town(TownId::new("Avalon"), Some(NationId::new("Albion")), claims(0))
        .add_town(TownId::new("Bastion"), Some(NationId::new("Borea")), claims(10))
        .add_resident(PlayerName::new("Ayla"), Some(TownId::new("Avalon")), true)
        .add_resident(PlayerName::new("Cato"), Some(TownId::new("Bastion")), true)
        .populate(&TownId::new("Avalon"), 2)
        .populate(&TownId::new("Bastion"), 2)
        .set_balance(PlayerName::new("Ayla"), 1_000.0);
    host
}

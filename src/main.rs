//! Ambient Sim - headless run of the ambient scheduler against an in-memory world
//!
//! Walks a player around a small map, ticks the scheduler and prints what
//! it spawned as JSON.

use std::path::PathBuf;

use ambient_spawns::core::types::{Allegiance, BodyTag, DenId, PointId, Rotation};
use ambient_spawns::den::{Den, PointDef, SpawnPoint};
use ambient_spawns::host::memory::{HostEvent, MemoryHost};
use ambient_spawns::host::{CollectionEntry, CollectionInfo, FactoryInfo, PlayerState};
use ambient_spawns::spawn::Composition;
use ambient_spawns::{AmbientConfig, AmbientScheduler, DefinitionCatalog, Result, SchedulerStats};
use clap::Parser;
use glam::Vec3;
use serde::Serialize;

/// Headless ambient spawn simulation
#[derive(Parser, Debug)]
#[command(name = "ambient_sim")]
#[command(about = "Tick the ambient scheduler over a demo map and report spawns as JSON")]
struct Args {
    /// Simulated seconds to run
    #[arg(long, default_value_t = 600.0)]
    seconds: f32,

    /// Seconds per tick
    #[arg(long, default_value_t = 0.1)]
    dt: f32,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Scheduler config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of spawn catalog pack files
    #[arg(long, default_value = "data/packs")]
    catalog: PathBuf,

    /// Map to load
    #[arg(long, default_value = "Fyrestone_P")]
    map: String,

    /// Include the full host event log in the output
    #[arg(long)]
    events: bool,
}

#[derive(Serialize)]
struct SimReport<'a> {
    seed: u64,
    map: &'a str,
    seconds: f32,
    stats: &'a SchedulerStats,
    spawned: usize,
    last_composition: Option<&'a Composition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a [HostEvent]>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ambient_spawns=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let config = match &args.config {
        Some(path) => AmbientConfig::load(path)?,
        None => AmbientConfig::default(),
    };
    let catalog = if args.catalog.is_dir() {
        DefinitionCatalog::load_directory(&args.catalog)?
    } else {
        tracing::warn!(path = %args.catalog.display(), "Catalog directory not found, running with native spawns only");
        DefinitionCatalog::new()
    };

    let mut host = demo_world(&args.map, seed);
    let mut scheduler = AmbientScheduler::with_seed(config, catalog, seed);

    scheduler.on_main_menu(&mut host);
    scheduler.on_map_loaded(&mut host);

    let ticks = (args.seconds / args.dt).ceil() as u64;
    for tick in 0..ticks {
        host.advance(args.dt);
        walk(&mut host, tick as f32 * args.dt);
        scheduler.tick(&mut host);
    }
    scheduler.on_map_leaving();

    let report = SimReport {
        seed,
        map: &args.map,
        seconds: args.seconds,
        stats: scheduler.stats(),
        spawned: host.actors().len(),
        last_composition: scheduler.last_composition(),
        events: args.events.then(|| host.events()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Circle the map center, looking along the direction of travel, with the
/// occasional keypress
fn walk(host: &mut MemoryHost, elapsed: f32) {
    let Some(player) = host.player_mut() else {
        return;
    };
    let angle = elapsed * 0.02;
    player.position = Vec3::new(angle.cos() * 2000.0, angle.sin() * 2000.0, 0.0);
    let heading = angle + std::f32::consts::FRAC_PI_2;
    player.view = Rotation::from_yaw((heading * Rotation::HALF_TURN / std::f32::consts::PI) as i32);
    if elapsed % 30.0 < 0.1 {
        player.since_input = 0.0;
    }
}

fn pawn(id: &str, body: &str) -> FactoryInfo {
    FactoryInfo::pawn(id, format!("AI_{}", id), Some(BodyTag::from(body)))
}

fn collection(id: &str, factories: &[&str]) -> CollectionInfo {
    CollectionInfo {
        id: id.into(),
        entries: factories
            .iter()
            .map(|f| CollectionEntry::Factory((*f).into()))
            .collect(),
        unique: false,
    }
}

fn demo_world(map: &str, seed: u64) -> MemoryHost {
    let mut host = MemoryHost::with_seed(map, seed);

    host.add_factory(pawn("Marauder", "Bandit"));
    host.add_factory(pawn("Psycho", "Bandit"));
    host.add_factory(pawn("Nomad_Grunt", "Bandit"));
    let mut taskmaster = pawn("Nomad_Taskmaster", "Bandit");
    taskmaster.badass = true;
    host.add_factory(taskmaster);
    host.add_factory(pawn("Skag_Pup", "Skag"));
    let mut alpha = pawn("Skag_Alpha", "Skag");
    alpha.champion = true;
    host.add_factory(alpha);

    host.add_collection(collection("PopDef_Bandits", &["Marauder", "Psycho", "Nomad_Grunt"]));
    host.add_collection(collection("PopDef_Skags", &["Skag_Pup", "Skag_Alpha"]));

    host.add_package(
        "Helios_Combat",
        vec![pawn("Loader_GUN", "Loader"), pawn("Loader_EXP", "Loader")],
        vec![collection("PopDef_LoaderMix", &["Loader_GUN", "Loader_EXP"])],
    );

    let jump = || PointDef::new("PopPointDef_Jump", vec![BodyTag::from("Bandit")]);
    let burrow = || PointDef::new("PopPointDef_Burrow", vec![BodyTag::from("Skag")]);

    let layout: [(u32, Vec3, &str, &str); 4] = [
        (1, Vec3::new(3500.0, 0.0, 0.0), "PopDef_Bandits", "Bandits"),
        (2, Vec3::new(0.0, 3500.0, 0.0), "PopDef_Skags", "Creatures"),
        (3, Vec3::new(-3500.0, 0.0, 0.0), "PopDef_Bandits", "Bandits"),
        (4, Vec3::new(0.0, -3500.0, 0.0), "PopDef_Skags", "Creatures"),
    ];
    let mut next_point = 1;
    for (id, location, native, allegiance) in layout {
        let mut den = Den::new(DenId(id), location);
        den.native = Some(native.into());
        den.allegiance = Some(Allegiance::from(allegiance));
        for offset in [Vec3::new(150.0, 0.0, 0.0), Vec3::new(-150.0, 80.0, 0.0)] {
            let def = if native == "PopDef_Skags" { burrow() } else { jump() };
            den.points
                .push(SpawnPoint::new(PointId(next_point), location + offset, Some(def)));
            next_point += 1;
        }
        den.points
            .push(SpawnPoint::new(PointId(next_point), location + Vec3::new(0.0, -200.0, 0.0), None));
        next_point += 1;
        host.add_den(den);
        host.set_den_stage(DenId(id), 8 + id);
    }

    host.set_player(Some(PlayerState {
        position: Vec3::new(2000.0, 0.0, 0.0),
        view: Rotation::from_yaw(16384),
        menu_blocked: false,
        since_combat: None,
        since_input: 0.0,
        game_stage: Some(10),
    }));
    host.set_cost_cap(Some(60.0));
    host
}
